use super::*;
use crate::config::MapperConfig;
use crate::fixtures::{Customer, Order, OrderLine, Tag};

fn finalized<T: Record>(map: SchemaMap<T>, dialect: Dialect) -> SchemaMap<T> {
    map.finalize(&MapperConfig::default().with_dialect(dialect))
        .unwrap()
}

fn adults() -> Condition {
    Condition::default()
        .field("Age")
        .is_greater_than(18)
        .and(|c| c.field("Active").is_true())
}

#[test]
fn select_with_conditions_and_cap() {
    let map = finalized(SchemaMap::<Customer>::new(), Dialect::Postgres);
    let spec = QuerySpec {
        conditions: vec![adults()],
        take: 5,
        ..QuerySpec::default()
    };

    let st = QueryCompiler::new(&map, Dialect::Postgres)
        .select(&spec, Variant::Short)
        .unwrap();
    assert_eq!(
        st.sql,
        r#"select * from "public"."Customers" where ("Age" > $1 and coalesce("Active",false)=true) limit 5"#
    );
    assert_eq!(st.params, vec![Value::Int(18)]);
    assert_eq!(st.kind, StatementKind::Select);
}

#[test]
fn sql_server_select_uses_top_and_default_order() {
    let map = finalized(
        SchemaMap::<Customer>::new()
            .by_default_order_by("Name")
            .ascending(),
        Dialect::SqlServer,
    );
    let spec = QuerySpec {
        conditions: vec![Condition::default().field("Name").contains("ad")],
        take: 10,
        ..QuerySpec::default()
    };

    let st = QueryCompiler::new(&map, Dialect::SqlServer)
        .select(&spec, Variant::Short)
        .unwrap();
    assert_eq!(
        st.sql,
        "select top 10 * from [dbo].[Customers] where [Name] like @p0 order by [Name]"
    );
    assert_eq!(st.params, vec![Value::from("%ad%")]);
}

#[test]
fn explicit_order_replaces_default() {
    let map = finalized(
        SchemaMap::<Customer>::new().by_default_order_by("Name"),
        Dialect::Postgres,
    );
    let mut spec = QuerySpec::default();
    spec.order.push("Id");
    spec.order.descending().unwrap();

    let st = QueryCompiler::new(&map, Dialect::Postgres)
        .select(&spec, Variant::Short)
        .unwrap();
    assert_eq!(st.sql, r#"select * from "public"."Customers" order by "Id" desc"#);
}

#[test]
fn full_variant_reads_extended_view() {
    let map = finalized(
        SchemaMap::<Customer>::new().query_with_views("CustomerList", "CustomerDetail"),
        Dialect::Postgres,
    );
    let compiler = QueryCompiler::new(&map, Dialect::Postgres);
    let spec = QuerySpec::default();
    assert_eq!(
        compiler.select(&spec, Variant::Full).unwrap().sql,
        r#"select * from "public"."CustomerDetail""#
    );
    assert_eq!(
        compiler.select(&spec, Variant::Short).unwrap().sql,
        r#"select * from "public"."CustomerList""#
    );
}

#[test]
fn take_does_not_double_cap() {
    let map = finalized(SchemaMap::<Customer>::new(), Dialect::SqlServer);
    let spec = QuerySpec {
        source: Source::Sql("select top 10 * from Customers".into()),
        take: 5,
        ..QuerySpec::default()
    };
    let st = QueryCompiler::new(&map, Dialect::SqlServer)
        .select(&spec, Variant::Short)
        .unwrap();
    assert_eq!(st.sql, "select top 10 * from Customers");

    let map = finalized(SchemaMap::<Customer>::new(), Dialect::Postgres);
    let spec = QuerySpec {
        source: Source::Sql("select * from customers limit 10".into()),
        take: 5,
        ..QuerySpec::default()
    };
    let st = QueryCompiler::new(&map, Dialect::Postgres)
        .select(&spec, Variant::Short)
        .unwrap();
    assert_eq!(st.sql, "select * from customers limit 10");
}

#[test]
fn count_has_no_order_or_cap() {
    let map = finalized(
        SchemaMap::<Customer>::new().by_default_order_by("Name"),
        Dialect::Postgres,
    );
    let spec = QuerySpec {
        conditions: vec![Condition::default().field("Name").is_equal_to("Ada")],
        take: 3,
        ..QuerySpec::default()
    };
    let compiler = QueryCompiler::new(&map, Dialect::Postgres);

    let st = compiler.select(&spec, Variant::Count).unwrap();
    assert_eq!(
        st.sql,
        r#"select count(*) from "public"."Customers" where "Name" = $1"#
    );
    assert_eq!(st.kind, StatementKind::Count);

    let raw = QuerySpec {
        source: Source::Sql("select * from recent_customers".into()),
        ..QuerySpec::default()
    };
    assert_eq!(
        compiler.select(&raw, Variant::Count).unwrap().sql,
        "select count(*) from (select * from recent_customers) as counted"
    );
}

#[test]
fn object_source_override() {
    let map = finalized(SchemaMap::<Customer>::new(), Dialect::Postgres);
    let spec = QuerySpec {
        source: Source::Object(Ident::parse("archive.Customers").unwrap()),
        ..QuerySpec::default()
    };
    let st = QueryCompiler::new(&map, Dialect::Postgres)
        .select(&spec, Variant::Short)
        .unwrap();
    assert_eq!(st.sql, r#"select * from "archive"."Customers""#);
}

#[test]
fn compiling_is_deterministic() {
    let map = finalized(SchemaMap::<Customer>::new(), Dialect::SqlServer);
    let spec = QuerySpec {
        conditions: vec![
            adults(),
            Condition::default().field("Id").is_in([1, 2, 3]).joined_by_or(),
        ],
        ..QuerySpec::default()
    };
    let compiler = QueryCompiler::new(&map, Dialect::SqlServer);
    let a = compiler.select(&spec, Variant::Short).unwrap();
    let b = compiler.select(&spec, Variant::Short).unwrap();
    assert_eq!(a, b);
    assert_eq!(
        a.sql,
        "select * from [dbo].[Customers] where ([Age] > @p0 and coalesce([Active],0)=1) or [Id] in (@p1, @p2, @p3)"
    );
}

#[test]
fn composite_key_select_and_cardinality() {
    let map = finalized(
        SchemaMap::<OrderLine>::new().keys(["OrderId", "Id"]),
        Dialect::Postgres,
    );
    let compiler = QueryCompiler::new(&map, Dialect::Postgres);

    let st = compiler
        .select_by_keys(Variant::Short, &[Value::Int(7), Value::Int(2)])
        .unwrap();
    assert_eq!(
        st.sql,
        r#"select * from "public"."OrderLines" where "OrderId" = $1 and "Id" = $2"#
    );

    let err = compiler
        .select_by_keys(Variant::Short, &[Value::Int(7)])
        .unwrap_err();
    assert!(matches!(
        err,
        OrmError::KeyCardinality {
            expected: 2,
            actual: 1,
            ..
        }
    ));
    assert!(compiler.delete_by_keys(&[]).is_err());
}

#[test]
fn probe_and_describe_use_write_table() {
    let map = finalized(
        SchemaMap::<Customer>::new().query_with_view(),
        Dialect::Postgres,
    );
    let compiler = QueryCompiler::new(&map, Dialect::Postgres);
    assert_eq!(
        compiler.probe(&[Value::Int(1)]).unwrap().sql,
        r#"select * from "public"."Customers" where "Id" = $1"#
    );
    let describe = compiler.describe().unwrap();
    assert_eq!(describe.sql, r#"select * from "public"."Customers" where 1=0"#);
    assert_eq!(describe.kind, StatementKind::Describe);
}

fn customer_columns() -> Vec<String> {
    ["Id", "Name", "Birthday", "Active", "CompanyId", "LastChange", "Extra"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[test]
fn insert_skips_generated_key_and_returns_it() {
    let customer = Customer {
        name: "Ada".into(),
        active: true,
        ..Customer::default()
    };

    let map = finalized(SchemaMap::<Customer>::new(), Dialect::Postgres);
    let st = QueryCompiler::new(&map, Dialect::Postgres)
        .insert(&customer, &customer_columns())
        .unwrap();
    assert_eq!(
        st.sql,
        r#"insert into "public"."Customers" ("Name", "Birthday", "Active", "CompanyId", "LastChange") values ($1, $2, $3, $4, $5) returning "Id""#
    );
    assert_eq!(
        st.params,
        vec![
            Value::from("Ada"),
            Value::Null,
            Value::Bool(true),
            Value::Null,
            Value::Null
        ]
    );

    let map = finalized(SchemaMap::<Customer>::new(), Dialect::SqlServer);
    let st = QueryCompiler::new(&map, Dialect::SqlServer)
        .insert(&customer, &["Id".to_string(), "Name".to_string()])
        .unwrap();
    assert_eq!(
        st.sql,
        "insert into [dbo].[Customers] ([Name]) values (@p0); select cast(scope_identity() as bigint)"
    );
}

#[test]
fn insert_writes_nested_and_referenced_keys() {
    let map = finalized(
        SchemaMap::<Order>::new().has_reference("BuyerId", "Customer.Id"),
        Dialect::Postgres,
    );
    let order = Order {
        total: 9.5,
        customer: Some(Customer {
            id: 4,
            ..Customer::default()
        }),
        ..Order::default()
    };
    let columns: Vec<String> = ["Id", "CustomerId", "BuyerId", "Total"]
        .into_iter()
        .map(String::from)
        .collect();

    let st = QueryCompiler::new(&map, Dialect::Postgres)
        .insert(&order, &columns)
        .unwrap();
    assert_eq!(
        st.sql,
        r#"insert into "public"."Orders" ("CustomerId", "BuyerId", "Total") values ($1, $2, $3) returning "Id""#
    );
    assert_eq!(
        st.params,
        vec![Value::Int(4), Value::Int(4), Value::Float(9.5)]
    );
}

#[test]
fn insert_with_caller_key_and_default_values() {
    let map = finalized(
        SchemaMap::<Tag>::new().include_id_in_insert(),
        Dialect::Postgres,
    );
    let tag = Tag {
        id: 5,
        name: "vip".into(),
    };
    let compiler = QueryCompiler::new(&map, Dialect::Postgres);
    assert_eq!(
        compiler
            .insert(&tag, &["Id".to_string(), "Name".to_string()])
            .unwrap()
            .sql,
        r#"insert into "public"."Tags" ("Id", "Name") values ($1, $2)"#
    );

    let map = finalized(SchemaMap::<Tag>::new(), Dialect::Postgres);
    assert_eq!(
        QueryCompiler::new(&map, Dialect::Postgres)
            .insert(&tag, &["Id".to_string()])
            .unwrap()
            .sql,
        r#"insert into "public"."Tags" default values returning "Id""#
    );
}

#[test]
fn update_sets_non_key_columns() {
    let map = finalized(SchemaMap::<Customer>::new(), Dialect::Postgres);
    let compiler = QueryCompiler::new(&map, Dialect::Postgres);
    let customer = Customer {
        id: 3,
        name: "Ada".into(),
        ..Customer::default()
    };
    let columns: Vec<String> = ["Id", "Name", "Active"].into_iter().map(String::from).collect();

    let st = compiler.update(&customer, &columns).unwrap().unwrap();
    assert_eq!(
        st.sql,
        r#"update "public"."Customers" set "Name" = $1, "Active" = $2 where "Id" = $3"#
    );
    assert_eq!(
        st.params,
        vec![Value::from("Ada"), Value::Bool(false), Value::Int(3)]
    );

    assert!(compiler.update(&customer, &["Id".to_string()]).unwrap().is_none());
}

#[test]
fn delete_statements() {
    let map = finalized(SchemaMap::<Customer>::new(), Dialect::Postgres);
    let compiler = QueryCompiler::new(&map, Dialect::Postgres);

    assert_eq!(
        compiler.delete_by_keys(&[Value::Int(3)]).unwrap().sql,
        r#"delete from "public"."Customers" where "Id" = $1"#
    );

    let st = compiler
        .delete_where(&[("Name", Value::from("Ada")), ("Birthday", Value::Null)])
        .unwrap();
    assert_eq!(
        st.sql,
        r#"delete from "public"."Customers" where "Name" = $1 and "Birthday" is null"#
    );
    assert_eq!(st.params, vec![Value::from("Ada")]);

    assert!(matches!(
        compiler.delete_where(&[]),
        Err(OrmError::Validation(_))
    ));
}

#[test]
fn relation_reads() {
    let map = finalized(Order::configure(SchemaMap::new()), Dialect::Postgres);
    let compiler = QueryCompiler::new(&map, Dialect::Postgres);

    let lines = ChildCollectionSpec::new("Lines");
    assert_eq!(
        compiler.relation_read(&lines, Value::Int(8)).unwrap().sql,
        r#"select * from "sales"."OrderLines" where "OrderId" = $1"#
    );

    let by_proc = ChildCollectionSpec::new("Tags").procedure("GetOrderTags");
    let st = compiler.relation_read(&by_proc, Value::Int(8)).unwrap();
    assert_eq!(st.sql, r#"select * from "sales"."GetOrderTags"($1)"#);
    assert_eq!(st.kind, StatementKind::Procedure);

    let by_fn = ChildCollectionSpec::new("Tags").function("dbo.order_tags");
    assert_eq!(
        compiler.relation_read(&by_fn, Value::Int(8)).unwrap().sql,
        r#"select * from "dbo"."order_tags"($1)"#
    );

    let map = finalized(Order::configure(SchemaMap::new()), Dialect::SqlServer);
    let st = QueryCompiler::new(&map, Dialect::SqlServer)
        .relation_read(&by_proc, Value::Int(8))
        .unwrap();
    assert_eq!(st.sql, "exec [sales].[GetOrderTags] @OrderId = @p0");
    assert_eq!(st.params, vec![Value::Int(8)]);
}

#[test]
fn link_rows() {
    let map = finalized(Order::configure(SchemaMap::new()), Dialect::Postgres);
    let compiler = QueryCompiler::new(&map, Dialect::Postgres);
    let tags = ChildCollectionSpec::new("Tags");

    let st = compiler
        .link_insert(&tags, "Tag", Value::Int(1), Value::Int(2))
        .unwrap();
    assert_eq!(
        st.sql,
        r#"insert into "sales"."OrderTags" ("OrderId", "TagId") values ($1, $2)"#
    );
    assert_eq!(st.params, vec![Value::Int(1), Value::Int(2)]);

    let st = compiler
        .link_delete(&tags, "Tag", Value::Int(1), Value::Int(2))
        .unwrap();
    assert_eq!(
        st.sql,
        r#"delete from "sales"."OrderTags" where "OrderId" = $1 and "TagId" = $2"#
    );

    let read_only = ChildCollectionSpec::new("Tags").read_only();
    assert!(matches!(
        compiler.link_insert(&read_only, "Tag", Value::Int(1), Value::Int(2)),
        Err(OrmError::RelationIntegrity { .. })
    ));
}

#[test]
fn configured_link_columns_are_validated_and_quoted() {
    let map = finalized(Order::configure(SchemaMap::new()), Dialect::SqlServer);
    let compiler = QueryCompiler::new(&map, Dialect::SqlServer);

    let dotted = ChildCollectionSpec::new("Tags").child_field("Label.Id");
    let st = compiler
        .link_delete(&dotted, "Tag", Value::Int(1), Value::Int(2))
        .unwrap();
    assert_eq!(
        st.sql,
        "delete from [sales].[OrderTags] where [OrderId] = @p0 and [Label.Id] = @p1"
    );

    let blank = ChildCollectionSpec::new("Tags").master_field("");
    assert!(matches!(
        compiler.link_insert(&blank, "Tag", Value::Int(1), Value::Int(2)),
        Err(OrmError::Validation(_))
    ));
    assert!(matches!(
        compiler.relation_read(&blank, Value::Int(1)),
        Err(OrmError::Validation(_))
    ));
}
