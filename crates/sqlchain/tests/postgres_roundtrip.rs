//! Live round trip against PostgreSQL. Skipped unless `DATABASE_URL` is set.

use sqlchain::prelude::*;
use std::collections::BTreeMap;
use tokio_postgres::NoTls;

sqlchain::data_object! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Widget {
        #[key]
        pub widget_key: Option<i32>,
        pub name: String,
        pub price: Option<f64>,
    }
}

fn widget_source(table: &str) -> ChainResult<DataSource<Postgres>> {
    let ds = DataSource::new(Postgres)
        .with_rules(AuditRules::new().with_rule(AuditRule::soft_delete("deleted", true)));
    ds.metadata().register_table(TableOrViewMetadata::new(
        ObjectName::parse(&format!("public.{table}"))?,
        true,
        vec![
            Postgres.column("widget_key").identity().primary_key(),
            Postgres.column("name"),
            Postgres.column("price"),
            Postgres.column("deleted"),
        ],
    ));
    Ok(ds)
}

#[tokio::test]
async fn widget_roundtrip() -> ChainResult<()> {
    dotenvy::dotenv().ok();
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(v) => v,
        Err(_) => {
            eprintln!("DATABASE_URL is not set; skipping widget_roundtrip");
            return Ok(());
        }
    };

    let (mut client, connection) = tokio_postgres::connect(&database_url, NoTls).await?;
    tokio::spawn(async move {
        let _ = connection.await;
    });

    let table = format!("sqlchain_widget_{}", std::process::id());
    client
        .batch_execute(&format!(
            "DROP TABLE IF EXISTS {table};
             CREATE TABLE {table} (
                 widget_key integer GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
                 name text NOT NULL,
                 price double precision,
                 deleted boolean NOT NULL DEFAULT false
             )"
        ))
        .await?;

    let ds = widget_source(&table)?;
    let exec = ds.executor(&client);

    let gear = Widget {
        widget_key: None,
        name: "gear".to_string(),
        price: Some(2.5),
    };
    let key: i32 = exec.to_scalar(&ds.insert(&table, &gear)?).await?;

    let mut filter = BTreeMap::new();
    filter.insert("widget_key".to_string(), Value::I32(key));
    let stored: Widget = exec.to_object(&ds.from(&table)?.with_filter(&filter)).await?;
    assert_eq!(stored.name, "gear");
    assert_eq!(stored.widget_key, Some(key));

    let repriced = Widget {
        price: Some(3.0),
        ..stored
    };
    let affected = exec.execute(&ds.update(&table, &repriced)?).await?;
    assert_eq!(affected, 1);

    let bolt = Widget {
        widget_key: None,
        name: "bolt".to_string(),
        price: None,
    };
    exec.execute(&ds.insert(&table, &bolt)?).await?;

    let all: Vec<Widget> = exec
        .to_collection(&ds.from(&table)?.with_sorting(["name"]))
        .await?;
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].name, "bolt");
    assert_eq!(all[1].price, Some(3.0));

    let by_key = exec
        .to_dictionary::<_, i32, Widget>(&ds.from(&table)?, "widget_key")
        .await?;
    assert_eq!(by_key[&key].name, "gear");

    // Soft delete: the row stays, selects stop returning it.
    exec.execute(&ds.delete(&table, &filter)?).await?;
    let visible: i64 = exec.to_scalar(&ds.from(&table)?.as_count()).await?;
    assert_eq!(visible, 1);
    let raw: i64 = exec
        .to_scalar(&ds.sql(format!("SELECT COUNT(*) FROM {table}"), None))
        .await?;
    assert_eq!(raw, 2);

    {
        let tx = client.transaction().await?;
        let tx_exec = ds.executor(&tx);
        tx_exec.execute(&ds.insert(&table, &gear)?).await?;
        let inside: i64 = tx_exec.to_scalar(&ds.from(&table)?.as_count()).await?;
        assert_eq!(inside, 2);
        tx.rollback().await?;
    }
    let exec = ds.executor(&client);
    let after: i64 = exec.to_scalar(&ds.from(&table)?.as_count()).await?;
    assert_eq!(after, 1);

    client.batch_execute(&format!("DROP TABLE {table}")).await?;
    Ok(())
}
