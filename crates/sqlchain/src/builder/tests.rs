use super::*;
use crate::dialect::{Dialect, Postgres, PostgresType, SqlServer, SqlServerType};
use crate::metadata::TableOrViewMetadata;
use crate::sort::SortExpression;
use std::collections::BTreeMap;

fn pg_table() -> TableOrViewMetadata<PostgresType> {
    TableOrViewMetadata::new(
        ObjectName::parse("hr.employee").unwrap(),
        true,
        vec![
            Postgres.column("id").primary_key(),
            Postgres.column("name"),
            Postgres.column("title"),
            Postgres.column("deleted"),
        ],
    )
}

fn pg_builder(style: ParameterStyle) -> SqlBuilder<PostgresType> {
    pg_table().create_sql_builder(false).with_parameter_style(style)
}

fn ss_builder(strict: bool) -> SqlBuilder<SqlServerType> {
    TableOrViewMetadata::new(
        ObjectName::parse("dbo.Employee").unwrap(),
        true,
        vec![
            SqlServer.column("EmployeeKey").identity().primary_key(),
            SqlServer.column("First Name"),
            SqlServer.column("Title"),
        ],
    )
    .create_sql_builder(strict)
}

fn map(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

struct Tracked {
    id: i32,
    name: &'static str,
    title: &'static str,
}

impl DataObject for Tracked {
    fn properties(&self) -> Vec<crate::argument::PropertyValue> {
        vec![
            crate::argument::PropertyValue::new("id", self.id),
            crate::argument::PropertyValue::new("name", self.name).key(),
            crate::argument::PropertyValue::new("title", self.title),
        ]
    }

    fn changed_properties(&self) -> Option<Vec<&'static str>> {
        Some(vec!["title"])
    }
}

struct Renamed {
    first_name: &'static str,
}

impl DataObject for Renamed {
    fn properties(&self) -> Vec<crate::argument::PropertyValue> {
        vec![crate::argument::PropertyValue::new("FirstName", self.first_name)]
    }
}

fn values(builder: &SqlBuilder<PostgresType>) -> Vec<Value> {
    builder.get_rendered_parameters(|e, slot| e.slot_value(slot))
}

#[test]
fn test_numbered_placeholders_follow_render_order() {
    let mut b = pg_builder(ParameterStyle::Numbered);
    let args = map(&[("id", Value::I32(1)), ("name", Value::from("Ada"))]);
    b.apply_argument_value(Argument::map(&args), ArgumentOptions::default(), false)
        .unwrap();

    let mut sql = String::new();
    b.build_set_clause(&mut sql, "SET ", None, None).unwrap();
    b.build_where_clause(&mut sql, " WHERE ", None).unwrap();
    assert_eq!(sql, "SET name = $1 WHERE id = $2");
    assert_eq!(values(&b), vec![Value::from("Ada"), Value::I32(1)]);
}

#[test]
fn test_positional_placeholders_repeat_values() {
    let mut b = pg_builder(ParameterStyle::Positional);
    let args = map(&[("id", Value::I32(1))]);
    b.apply_argument_value(Argument::map(&args), ArgumentOptions::default(), false)
        .unwrap();
    let predicate = b
        .apply_filter_value(Argument::map(&args), FilterOptions::default(), false)
        .unwrap();
    let mut sql = String::new();
    b.build_where_clause(&mut sql, " AND ", None).unwrap();

    assert_eq!(format!("{predicate}{sql}"), "id = ? AND id = ?");
    assert_eq!(b.rendered_parameter_count(), 2);
}

#[test]
fn test_numbered_placeholders_are_reused() {
    let mut b = pg_builder(ParameterStyle::Numbered);
    let args = map(&[("id", Value::I32(1))]);
    b.apply_argument_value(Argument::map(&args), ArgumentOptions::default(), false)
        .unwrap();
    let predicate = b
        .apply_filter_value(Argument::map(&args), FilterOptions::default(), false)
        .unwrap();
    let mut sql = String::new();
    b.build_where_clause(&mut sql, "", None).unwrap();

    assert_eq!(predicate, "id = $1");
    assert_eq!(sql, "id = $1");
    assert_eq!(b.rendered_parameter_count(), 1);
}

#[test]
fn test_parameter_offset_shifts_numbers() {
    let mut b = pg_builder(ParameterStyle::Numbered);
    b.set_parameter_offset(2);
    let filter = map(&[("name", Value::from("Ada"))]);
    let predicate = b
        .apply_filter_value(Argument::map(&filter), FilterOptions::default(), false)
        .unwrap();
    assert_eq!(predicate, "name = $3");
}

#[test]
fn test_named_parameters_in_column_order() {
    let mut b = ss_builder(false);
    let args = map(&[("Title", Value::from("Dr")), ("EmployeeKey", Value::I32(4))]);
    b.apply_argument_value(Argument::map(&args), ArgumentOptions::default(), false)
        .unwrap();
    let mut sql = String::new();
    b.build_set_clause(&mut sql, "", None, None).unwrap();
    b.build_where_clause(&mut sql, " WHERE ", None).unwrap();
    assert_eq!(sql, "[Title] = @Title WHERE [EmployeeKey] = @EmployeeKey");

    let names = b.get_parameters(|e, _| e.details().sql_variable_name.clone());
    assert_eq!(names, vec!["@EmployeeKey", "@Title"]);
}

#[test]
fn test_filter_nulls() {
    let mut b = pg_builder(ParameterStyle::Numbered);
    let filter = map(&[("name", Value::Null), ("title", Value::from("Dr"))]);
    let predicate = b
        .apply_filter_value(Argument::map(&filter), FilterOptions::default(), false)
        .unwrap();
    assert_eq!(predicate, "name IS NULL AND title = $1");

    let mut b = pg_builder(ParameterStyle::Numbered);
    let predicate = b
        .apply_filter_value(Argument::map(&filter), FilterOptions::ignore_nulls(), false)
        .unwrap();
    assert_eq!(predicate, "title = $1");
}

#[test]
fn test_second_slot_has_its_own_value() {
    let mut b = pg_builder(ParameterStyle::Numbered);
    let set = map(&[("title", Value::from("B"))]);
    b.apply_argument_value(Argument::map(&set), ArgumentOptions::default(), false)
        .unwrap();

    let mut sql = String::new();
    b.build_set_clause(&mut sql, "", None, None).unwrap();
    let old = map(&[("title", Value::from("A"))]);
    let predicate = b
        .apply_filter_value(Argument::map(&old), FilterOptions::default(), true)
        .unwrap();
    assert_eq!(format!("{sql} WHERE {predicate}"), "title = $1 WHERE title = $2");
    assert_eq!(values(&b), vec![Value::from("B"), Value::from("A")]);

    let again = map(&[("title", Value::from("C"))]);
    let err = b
        .apply_filter_value(Argument::map(&again), FilterOptions::default(), true)
        .unwrap_err();
    assert!(err.is_unsupported());
}

#[test]
fn test_named_second_slot_is_a_separate_variable() {
    let mut b = ss_builder(false);
    let set = map(&[("Title", Value::from("Dr"))]);
    b.apply_argument_value(Argument::map(&set), ArgumentOptions::default(), false)
        .unwrap();
    let mut sql = String::new();
    b.build_set_clause(&mut sql, "", None, None).unwrap();
    let old = map(&[("Title", Value::from("Mr"))]);
    let predicate = b
        .apply_filter_value(Argument::map(&old), FilterOptions::default(), true)
        .unwrap();
    assert_eq!(sql, "[Title] = @Title");
    assert_eq!(predicate, "[Title] = @Title_2");

    let parameters = b.get_parameters(|e, slot| (e.slot_variable_name(slot), e.slot_value(slot)));
    assert_eq!(
        parameters,
        vec![
            ("@Title".to_string(), Value::from("Dr")),
            ("@Title_2".to_string(), Value::from("Mr")),
        ]
    );
}

#[test]
fn test_strict_mode_rejects_unknown_members() {
    let args = map(&[("Nickname", Value::from("Al"))]);

    let mut lenient = ss_builder(false);
    assert!(
        lenient
            .apply_argument_value(Argument::map(&args), ArgumentOptions::default(), false)
            .is_ok()
    );

    let mut strict = ss_builder(true);
    let err = strict
        .apply_argument_value(Argument::map(&args), ArgumentOptions::default(), false)
        .unwrap_err();
    assert!(err.is_mapping());

    // Deletes carry whole objects; extra members are expected.
    let mut strict = ss_builder(true);
    assert!(
        strict
            .apply_argument_value(Argument::map(&args), ArgumentOptions::default(), true)
            .is_ok()
    );
}

#[test]
fn test_host_name_match_aliases_column() {
    let mut b = ss_builder(false);
    let renamed = Renamed { first_name: "Ada" };
    b.apply_argument_value(Argument::object(&renamed), ArgumentOptions::default(), false)
        .unwrap();
    b.apply_desired_columns(&DesiredColumns::Named(vec!["FirstName".to_string()]))
        .unwrap();

    let mut sql = String::new();
    b.build_select_clause(&mut sql, "SELECT ", None, None);
    assert_eq!(sql, "SELECT [First Name] AS FirstName");
    assert_eq!(b.entry("First Name").unwrap().parameter_value(), Some(&Value::from("Ada")));
}

#[test]
fn test_changed_properties_only() {
    let mut b = pg_builder(ParameterStyle::Numbered);
    let tracked = Tracked {
        id: 1,
        name: "Ada",
        title: "Dr",
    };
    let options = ArgumentOptions::new().changed_properties_only(true);
    b.apply_argument_value(Argument::object(&tracked), options, false).unwrap();
    let updates: Vec<&str> = b
        .get_update_columns()
        .map(|e| e.details().sql_name.as_str())
        .collect();
    assert_eq!(updates, vec!["title"]);

    let args = map(&[("id", Value::I32(1))]);
    let err = pg_builder(ParameterStyle::Numbered)
        .apply_argument_value(Argument::map(&args), options, false)
        .unwrap_err();
    assert!(matches!(err, ChainError::InvalidArgument(_)));
}

#[test]
fn test_key_attribute_replaces_primary_key() {
    let mut b = pg_builder(ParameterStyle::Numbered);
    let tracked = Tracked {
        id: 1,
        name: "Ada",
        title: "Dr",
    };
    b.apply_argument_value(
        Argument::object(&tracked),
        ArgumentOptions::new().use_key_attribute(true),
        false,
    )
    .unwrap();
    let keys: Vec<&str> = b.get_key_columns().map(|e| e.details().sql_name.as_str()).collect();
    assert_eq!(keys, vec!["name"]);
}

#[test]
fn test_override_keys() {
    let mut b = pg_builder(ParameterStyle::Numbered);
    b.override_keys(&["name", "title"]).unwrap();
    let keys: Vec<&str> = b.get_key_columns().map(|e| e.details().sql_name.as_str()).collect();
    assert_eq!(keys, vec!["name", "title"]);

    assert!(matches!(b.override_keys(&[]), Err(ChainError::ArgumentEmpty(_))));
    assert!(b.override_keys(&["missing"]).unwrap_err().is_mapping());
}

#[test]
fn test_desired_columns() {
    let mut b = pg_builder(ParameterStyle::Numbered);
    b.apply_desired_columns(&DesiredColumns::AutoSelect).unwrap();
    let read: Vec<&str> = b.get_select_columns().map(|e| e.details().sql_name.as_str()).collect();
    assert_eq!(read, vec!["id"]);

    let mut b = pg_builder(ParameterStyle::Numbered);
    let err = b.apply_desired_columns(&DesiredColumns::Named(Vec::new())).unwrap_err();
    assert!(matches!(err, ChainError::Invariant(_)));

    let err = b
        .apply_desired_columns(&DesiredColumns::Named(vec!["nope".to_string()]))
        .unwrap_err();
    assert!(err.is_mapping());

    // Lenient mode skips names that do not match as long as one does.
    b.apply_desired_columns(&DesiredColumns::Named(vec!["nope".to_string(), "title".to_string()]))
        .unwrap();
    assert!(b.has_read_fields());
}

#[test]
fn test_auto_select_without_key_or_identity() {
    let table = TableOrViewMetadata::new(
        ObjectName::parse("hr.note").unwrap(),
        true,
        vec![Postgres.column("body")],
    );
    let mut b = table.create_sql_builder(false);
    assert!(b.apply_desired_columns(&DesiredColumns::AutoSelect).unwrap_err().is_mapping());
}

#[test]
fn test_empty_set_clause_fails() {
    let mut b = pg_builder(ParameterStyle::Numbered);
    let args = map(&[("id", Value::I32(1))]);
    b.apply_argument_value(Argument::map(&args), ArgumentOptions::default(), false)
        .unwrap();
    let mut sql = String::new();
    let err = b.build_set_clause(&mut sql, " SET ", None, None).unwrap_err();
    assert!(err.is_mapping());
    assert!(sql.is_empty());
}

#[test]
fn test_where_clause_requires_bound_key() {
    let mut b = pg_builder(ParameterStyle::Numbered);
    let mut sql = String::new();
    assert!(b.build_where_clause(&mut sql, " WHERE ", None).unwrap_err().is_mapping());
}

#[test]
fn test_order_by_suffixes() {
    let b = pg_builder(ParameterStyle::Numbered);
    let mut sql = String::new();
    b.build_order_by_clause(
        &mut sql,
        " ORDER BY ",
        &[
            SortExpression::from("name DESC"),
            SortExpression::from("title ACS"),
            SortExpression::desc("id"),
            SortExpression::raw("length(name)"),
        ],
        None,
    )
    .unwrap();
    assert_eq!(sql, " ORDER BY name DESC , title, id DESC , length(name)");
}

#[test]
fn test_order_by_unknown_column_lists_legal_names() {
    let b = pg_builder(ParameterStyle::Numbered);
    let mut sql = String::new();
    let err = b
        .build_order_by_clause(&mut sql, " ORDER BY ", &[SortExpression::asc("salary")], None)
        .unwrap_err();
    assert!(err.to_string().contains("id, name, title, deleted"));
}

#[test]
fn test_soft_delete_clause_skips_filtered_column() {
    let rules = AuditRules::new().with_rule(AuditRule::soft_delete("deleted", true));

    let mut b = pg_builder(ParameterStyle::Numbered);
    let mut sql = String::new();
    assert!(b.build_soft_delete_clause(&mut sql, " WHERE ", &rules, None).unwrap());
    assert_eq!(sql, " WHERE deleted <> $1");
    assert_eq!(values(&b), vec![Value::Bool(true)]);

    let mut b = pg_builder(ParameterStyle::Numbered);
    let filter = map(&[("deleted", Value::Bool(true))]);
    b.apply_filter_value(Argument::map(&filter), FilterOptions::default(), false)
        .unwrap();
    let mut sql = String::new();
    assert!(!b.build_soft_delete_clause(&mut sql, " AND ", &rules, None).unwrap());
    assert!(sql.is_empty());
}

#[test]
fn test_rules_stamp_only_their_half_of_an_upsert() {
    let rules = AuditRules::new()
        .with_rule(AuditRule::value("title", "new", OperationTypes::INSERT))
        .with_rule(AuditRule::value("deleted", false, OperationTypes::INSERT_OR_UPDATE));
    let mut b = pg_builder(ParameterStyle::Numbered);
    let args = map(&[("id", Value::I32(1)), ("name", Value::from("Ada"))]);
    b.override_argument_values(
        &rules,
        OperationTypes::INSERT_OR_UPDATE,
        Argument::map(&args),
        ArgumentOptions::default(),
    )
    .unwrap();

    let inserts: Vec<&str> = b
        .get_insert_columns(false)
        .map(|e| e.details().sql_name.as_str())
        .collect();
    let updates: Vec<&str> = b
        .get_update_columns()
        .map(|e| e.details().sql_name.as_str())
        .collect();
    assert_eq!(inserts, vec!["id", "name", "title", "deleted"]);
    assert_eq!(updates, vec!["name", "deleted"]);
}

#[test]
fn test_restrictions_hide_columns() {
    let restriction =
        AuditRule::restrict_column(Some("hr.employee"), "title", OperationTypes::ALL).unwrap();
    let rules = AuditRules::new().with_rule(restriction);
    let mut b = pg_builder(ParameterStyle::Numbered);
    let args = map(&[("id", Value::I32(1)), ("title", Value::from("Dr"))]);
    b.override_argument_values(
        &rules,
        OperationTypes::UPDATE,
        Argument::map(&args),
        ArgumentOptions::default(),
    )
    .unwrap();
    b.apply_desired_columns(&DesiredColumns::AllColumns).unwrap();

    assert!(b.get_update_columns().next().is_none());
    assert!(b.get_insert_columns(false).all(|e| e.details().sql_name != "title"));
    let read: Vec<&str> = b.get_select_columns().map(|e| e.details().sql_name.as_str()).collect();
    assert_eq!(read, vec!["id", "name", "deleted"]);
}

#[test]
fn test_identity_written_only_when_requested() {
    let mut b = ss_builder(false);
    let args = map(&[("EmployeeKey", Value::I32(9)), ("Title", Value::from("Dr"))]);
    b.apply_argument_value(Argument::map(&args), ArgumentOptions::default(), false)
        .unwrap();

    let mut without = String::new();
    b.build_insert_clause(&mut without, "(", None, Some(")"), false);
    let mut with = String::new();
    b.build_insert_clause(&mut with, "(", None, Some(")"), true);
    assert_eq!(without, "([Title])");
    assert_eq!(with, "([EmployeeKey], [Title])");
}

#[test]
fn test_routine_arguments_bind_parameters() {
    use crate::metadata::{ParameterDirection, RoutineKind, RoutineMetadata};

    let routine = RoutineMetadata::new(
        ObjectName::parse("dbo.Lookup").unwrap(),
        RoutineKind::TableFunction,
        vec![
            SqlServer.parameter("Title"),
            SqlServer
                .parameter("ReturnValue")
                .with_direction(ParameterDirection::Return),
        ],
        vec![SqlServer.column("Title"), SqlServer.column("Name")],
    );
    let mut b = routine.create_sql_builder(true);
    let args = map(&[("Title", Value::from("Dr"))]);
    b.apply_argument_value(Argument::map(&args), ArgumentOptions::default(), false)
        .unwrap();

    assert_eq!(b.get_formal_parameters().count(), 1);
    let title = b.get_formal_parameters().next().unwrap();
    assert_eq!(title.parameter_value(), Some(&Value::from("Dr")));
    // The result column of the same name is untouched.
    assert!(b.entries().iter().filter(|e| !e.is_formal_parameter()).all(|e| !e.is_bound()));

    let unknown = map(&[("Name", Value::from("x"))]);
    assert!(
        b.apply_argument_value(Argument::map(&unknown), ArgumentOptions::default(), false)
            .unwrap_err()
            .is_mapping()
    );
}

#[test]
fn test_statement_copies_leave_the_template_alone() {
    let table = pg_table();
    let mut b = table.create_sql_builder(true);
    b.override_keys(&["name"]).unwrap();
    for entry in b.entries.iter_mut() {
        entry.set_use_for_insert(false);
    }
    assert!(b.entry("name").unwrap().is_key());
    assert!(!b.entry("id").unwrap().is_key());

    let template = table.template();
    assert!(template.entry("id").unwrap().is_key());
    assert!(!template.entry("name").unwrap().is_key());
    assert!(template.entries().iter().all(|e| e.use_for_insert()));
    assert!(!template.strict_mode());
}

fn identity_table() -> TableOrViewMetadata<PostgresType> {
    TableOrViewMetadata::new(
        ObjectName::parse("hr.badge").unwrap(),
        true,
        vec![
            Postgres.column("id").identity().primary_key(),
            Postgres.column("name"),
            Postgres.column("title"),
        ],
    )
}

#[test]
fn test_insert_and_values_clauses_pair_up() {
    let args = map(&[
        ("title", Value::from("Dr")),
        ("id", Value::I32(7)),
        ("name", Value::from("Ada")),
    ]);
    for (include_identity, expected, parameters) in [
        (
            false,
            " (name, title) VALUES ($1, $2)",
            vec![Value::from("Ada"), Value::from("Dr")],
        ),
        (
            true,
            " (id, name, title) VALUES ($1, $2, $3)",
            vec![Value::I32(7), Value::from("Ada"), Value::from("Dr")],
        ),
    ] {
        let mut b = identity_table()
            .create_sql_builder(false)
            .with_parameter_style(ParameterStyle::Numbered);
        b.apply_argument_value(Argument::map(&args), ArgumentOptions::default(), false)
            .unwrap();
        assert_eq!(b.get_insert_columns(include_identity).count(), parameters.len());

        let mut sql = String::new();
        b.build_insert_clause(&mut sql, " (", None, Some(")"), include_identity);
        b.build_values_clause(&mut sql, " VALUES (", Some(")"), include_identity);
        assert_eq!(sql, expected);
        assert_eq!(values(&b), parameters);
    }
}

struct Untagged {
    id: i32,
    title: &'static str,
}

impl DataObject for Untagged {
    fn properties(&self) -> Vec<crate::argument::PropertyValue> {
        vec![
            crate::argument::PropertyValue::new("id", self.id),
            crate::argument::PropertyValue::new("title", self.title),
        ]
    }
}

#[test]
fn test_key_attribute_needs_declared_keys() {
    let untagged = Untagged { id: 3, title: "Dr" };
    assert!(!untagged.declares_keys());
    let mut b = pg_builder(ParameterStyle::Numbered);
    b.apply_argument_value(
        Argument::Object(&untagged),
        ArgumentOptions::new().use_key_attribute(true),
        false,
    )
    .unwrap();
    assert!(b.entry("id").unwrap().is_key());

    let tracked = Tracked { id: 3, name: "Ada", title: "Dr" };
    assert!(tracked.declares_keys());
    let mut b = pg_builder(ParameterStyle::Numbered);
    b.apply_argument_value(
        Argument::Object(&tracked),
        ArgumentOptions::new().use_key_attribute(true),
        false,
    )
    .unwrap();
    assert!(!b.entry("id").unwrap().is_key());
    assert!(b.entry("name").unwrap().is_key());
}

#[test]
fn test_anonymous_where_clause_ignores_the_style() {
    let mut b = ss_builder(false);
    let args = map(&[("EmployeeKey", Value::I32(4))]);
    b.apply_argument_value(Argument::map(&args), ArgumentOptions::default(), false)
        .unwrap();
    let mut sql = String::new();
    b.build_anonymous_where_clause(&mut sql, "WHERE ", Some(";")).unwrap();
    assert_eq!(sql, "WHERE [EmployeeKey] = ?;");
    assert_eq!(b.parameter_style(), ParameterStyle::Named);
    assert_eq!(b.rendered_parameter_count(), 1);
}
