//! Command preparation through the public API, without a database.

use sqlchain::prelude::*;
use sqlchain::{DateTimeKind, UpdateOptions};
use std::collections::BTreeMap;

sqlchain::data_object! {
    #[derive(Debug, Clone)]
    pub struct Employee {
        #[key]
        pub employee_key: Option<i32>,
        pub first_name: String,
        pub last_name: String,
        #[ignore_on_update]
        pub title: Option<String>,
    }
}

sqlchain::data_object! {
    #[derive(Debug, Clone)]
    pub struct Person {
        #[key]
        #[column = "Email"]
        pub email: String,
        #[column = "GivenName"]
        pub given: String,
    }
}

fn employees() -> DataSource<Postgres> {
    let ds = DataSource::new(Postgres);
    ds.metadata().register_table(TableOrViewMetadata::new(
        ObjectName::parse("hr.employee").unwrap(),
        true,
        vec![
            Postgres.column("employee_key").identity().primary_key(),
            Postgres.column("first_name"),
            Postgres.column("last_name"),
            Postgres.column("title"),
            Postgres.column("updated_date"),
        ],
    ));
    ds
}

fn people() -> DataSource<SqlServer> {
    let ds = DataSource::new(SqlServer);
    ds.metadata().register_table(TableOrViewMetadata::new(
        ObjectName::parse("dbo.Person").unwrap(),
        true,
        vec![
            SqlServer.column("PersonKey").identity().primary_key(),
            SqlServer.column("Email"),
            SqlServer.column("GivenName"),
        ],
    ));
    ds
}

fn ada(key: Option<i32>) -> Employee {
    Employee {
        employee_key: key,
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        title: Some("Countess".to_string()),
    }
}

#[test]
fn test_insert_object() {
    let ds = employees();
    let employee = ada(None);
    let prepared = ds
        .insert("hr.employee", &employee)
        .unwrap()
        .prepare(&DesiredColumns::AutoSelect)
        .unwrap();
    let plan = prepared.into_single().unwrap();
    assert_eq!(
        plan.sql,
        "INSERT INTO hr.employee (first_name, last_name, title) VALUES ($1, $2, $3) RETURNING employee_key"
    );
    assert_eq!(
        plan.parameters,
        vec![Value::from("Ada"), Value::from("Lovelace"), Value::from("Countess")]
    );
}

#[test]
fn test_update_object_skips_ignored_members() {
    let ds = employees();
    let employee = ada(Some(5));
    let prepared = ds.update("hr.employee", &employee).unwrap().prepare_non_query().unwrap();
    assert_eq!(
        prepared.sql(),
        "UPDATE hr.employee SET first_name = $1, last_name = $2 WHERE employee_key = $3"
    );
}

#[test]
fn test_update_stamps_date() {
    let ds = employees().with_rules(AuditRules::new().with_rule(AuditRule::date_time(
        "updated_date",
        DateTimeKind::Utc,
        OperationTypes::UPDATE,
    )));
    let employee = ada(Some(5));
    let plan = ds
        .update("hr.employee", &employee)
        .unwrap()
        .prepare_non_query()
        .unwrap()
        .into_single()
        .unwrap();
    assert_eq!(
        plan.sql,
        "UPDATE hr.employee SET first_name = $1, last_name = $2, updated_date = $3 WHERE employee_key = $4"
    );
    assert!(matches!(plan.parameters[2], Value::TimestampTz(_)));
}

#[test]
fn test_select_columns_of_type() {
    let ds = employees();
    let prepared = ds
        .from("hr.employee")
        .unwrap()
        .with_sorting([SortExpression::desc("last_name")])
        .prepare(&DesiredColumns::of::<Employee>())
        .unwrap();
    assert_eq!(
        prepared.sql(),
        "SELECT employee_key, first_name, last_name, title FROM hr.employee ORDER BY last_name DESC "
    );
}

#[test]
fn test_filter_from_map() {
    let ds = employees();
    let mut filter = BTreeMap::new();
    filter.insert("last_name".to_string(), Value::from("Lovelace"));
    filter.insert("title".to_string(), Value::Null);
    let plan = ds
        .from("hr.employee")
        .unwrap()
        .with_filter(&filter)
        .as_count()
        .prepare_non_query()
        .unwrap()
        .into_single()
        .unwrap();
    assert_eq!(
        plan.sql,
        "SELECT COUNT(*) FROM hr.employee WHERE last_name = $1 AND title IS NULL"
    );
    assert_eq!(plan.parameters, vec![Value::from("Lovelace")]);
}

#[test]
fn test_column_markers() {
    use sqlchain::ColumnList;
    assert_eq!(Person::column_names(), vec!["Email", "GivenName"]);

    let ds = people();
    let person = Person {
        email: "ada@example.com".to_string(),
        given: "Ada".to_string(),
    };
    let prepared = ds
        .update("dbo.Person", &person)
        .unwrap()
        .with_options(UpdateOptions::new().use_key_attribute(true))
        .prepare_non_query()
        .unwrap();
    assert_eq!(
        prepared.sql(),
        "UPDATE [dbo].[Person] SET [GivenName] = @GivenName WHERE [Email] = @Email;"
    );
}

#[test]
fn test_update_without_key_value_is_a_mapping_error() {
    let ds = people();
    let person = Person {
        email: "ada@example.com".to_string(),
        given: "Ada".to_string(),
    };
    let err = ds.update("dbo.Person", &person).unwrap().prepare_non_query().unwrap_err();
    assert!(err.is_mapping());
}

#[test]
fn test_unknown_object() {
    let ds = employees();
    let err = ds.from("hr.nothing").unwrap_err();
    assert!(matches!(err, ChainError::MissingObject(_)));
    assert!(err.to_string().contains("hr.nothing"));
}
