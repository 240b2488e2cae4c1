//! Record types shared by unit tests.

use crate::record::{FieldSet, Record};
use crate::schema::{ChildCollectionSpec, SchemaMap};
use crate::value::Value;
use chrono::{DateTime, NaiveDate, Utc};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Country {
    pub id: i64,
    pub name: String,
}

impl Record for Country {
    const TYPE_NAME: &'static str = "Country";

    fn fields(f: &mut FieldSet<Self>) {
        f.field("Id", |c| &c.id, |c| &mut c.id)
            .field("Name", |c| &c.name, |c| &mut c.name);
    }

    fn key(&self) -> Value {
        self.id.into()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub country: Option<Country>,
}

impl Record for Company {
    const TYPE_NAME: &'static str = "Company";

    fn fields(f: &mut FieldSet<Self>) {
        f.field("Id", |c| &c.id, |c| &mut c.id)
            .field("Name", |c| &c.name, |c| &mut c.name)
            .nested("Country", |c| &c.country, |c| &mut c.country);
    }

    fn key(&self) -> Value {
        self.id.into()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub birthday: Option<NaiveDate>,
    pub active: bool,
    pub company: Option<Company>,
    pub last_change: Option<DateTime<Utc>>,
}

impl Record for Customer {
    const TYPE_NAME: &'static str = "Customer";

    fn fields(f: &mut FieldSet<Self>) {
        f.field("Id", |c| &c.id, |c| &mut c.id)
            .field("Name", |c| &c.name, |c| &mut c.name)
            .field("Birthday", |c| &c.birthday, |c| &mut c.birthday)
            .field("Active", |c| &c.active, |c| &mut c.active)
            .nested("Company", |c| &c.company, |c| &mut c.company)
            .field("LastChange", |c| &c.last_change, |c| &mut c.last_change)
            .computed("DisplayName", |c| Value::Text(format!("{} ({})", c.name, c.id)));
    }

    fn key(&self) -> Value {
        self.id.into()
    }

    fn last_change(&self) -> Option<DateTime<Utc>> {
        self.last_change
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderLine {
    pub id: i64,
    pub order_id: i64,
    pub product: String,
    pub qty: i32,
}

impl Record for OrderLine {
    const TYPE_NAME: &'static str = "OrderLine";

    fn fields(f: &mut FieldSet<Self>) {
        f.field("Id", |l| &l.id, |l| &mut l.id)
            .field("OrderId", |l| &l.order_id, |l| &mut l.order_id)
            .field("Product", |l| &l.product, |l| &mut l.product)
            .field("Qty", |l| &l.qty, |l| &mut l.qty);
    }

    fn key(&self) -> Value {
        self.id.into()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

impl Record for Tag {
    const TYPE_NAME: &'static str = "Tag";

    fn fields(f: &mut FieldSet<Self>) {
        f.field("Id", |t| &t.id, |t| &mut t.id)
            .field("Name", |t| &t.name, |t| &mut t.name);
    }

    fn key(&self) -> Value {
        self.id.into()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Order {
    pub id: i64,
    pub customer: Option<Customer>,
    pub total: f64,
    pub lines: Option<Vec<OrderLine>>,
    pub tags: Option<Vec<Tag>>,
}

impl Record for Order {
    const TYPE_NAME: &'static str = "Order";

    fn fields(f: &mut FieldSet<Self>) {
        f.field("Id", |o| &o.id, |o| &mut o.id)
            .nested("Customer", |o| &o.customer, |o| &mut o.customer)
            .field("Total", |o| &o.total, |o| &mut o.total)
            .collection("Lines", |o| &o.lines, |o| &mut o.lines)
            .collection("Tags", |o| &o.tags, |o| &mut o.tags);
    }

    fn key(&self) -> Value {
        self.id.into()
    }

    fn configure(map: SchemaMap<Self>) -> SchemaMap<Self> {
        map.schema("sales")
            .with_many::<OrderLine>(ChildCollectionSpec::new("Lines"))
            .with_many_to_many::<Tag>(ChildCollectionSpec::new("Tags"))
    }
}

/// Self-referencing record through a boxed slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    pub manager: Option<Box<Employee>>,
}

impl Record for Employee {
    const TYPE_NAME: &'static str = "Employee";

    fn fields(f: &mut FieldSet<Self>) {
        f.field("Id", |e| &e.id, |e| &mut e.id)
            .field("Name", |e| &e.name, |e| &mut e.name)
            .nested_boxed("Manager", |e| &e.manager, |e| &mut e.manager);
    }

    fn key(&self) -> Value {
        self.id.into()
    }
}
