#![allow(dead_code)]
use std::sync::Arc;

use query_core::{FieldKind, FieldSet, Value};
use repokit::{
    DeletePolicy, Entity, MemoryStore, Record, Relation, RelationRegistry, Repository,
    RepositoryConfig, Timestamps,
};

#[derive(Clone, Debug, PartialEq)]
pub struct Customer {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub age: i64,
    pub email: Option<String>,
    pub address: Option<Address>,
    pub ts: Timestamps,
    /// Orders loaded together with the customer, `None` when not loaded.
    pub orders: Option<Vec<Order>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Address {
    pub city: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Order {
    pub id: i64,
    pub customer_id: i64,
    pub number: String,
    pub ts: Timestamps,
    pub lines: Option<Vec<OrderLine>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderLine {
    pub id: i64,
    pub order_id: i64,
    pub sku: String,
    pub ts: Timestamps,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Note {
    pub id: i64,
    pub customer_id: i64,
    pub ts: Timestamps,
}

#[derive(Clone, Debug, PartialEq)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub ts: Timestamps,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub ts: Timestamps,
}

macro_rules! entity {
    ($ty:ty, $name:literal) => {
        impl Entity for $ty {
            type Id = i64;
            const NAME: &'static str = $name;

            fn id(&self) -> &i64 {
                &self.id
            }
            fn timestamps(&self) -> &Timestamps {
                &self.ts
            }
            fn timestamps_mut(&mut self) -> &mut Timestamps {
                &mut self.ts
            }
        }
    };
}

entity!(Customer, "Customer");
entity!(Order, "Order");
entity!(OrderLine, "OrderLine");
entity!(Note, "Note");
entity!(User, "User");
entity!(Profile, "Profile");

fn stamp(ts: &Timestamps, path: &str) -> Option<Value> {
    path.strip_prefix("timestamps.").and_then(|name| ts.field(name))
}

impl Record for Customer {
    fn field(&self, path: &str) -> Option<Value> {
        match path {
            "id" => Some(self.id.into()),
            "firstName" => Some(self.first_name.clone().into()),
            "lastName" => Some(self.last_name.clone().into()),
            "age" => Some(self.age.into()),
            "email" => Some(self.email.clone().into()),
            // no address: the path does not resolve
            "address.city" => self.address.as_ref().map(|a| a.city.clone().into()),
            other => stamp(&self.ts, other),
        }
    }
}

impl Record for Order {
    fn field(&self, path: &str) -> Option<Value> {
        match path {
            "id" => Some(self.id.into()),
            "customerId" => Some(self.customer_id.into()),
            "number" => Some(self.number.clone().into()),
            other => stamp(&self.ts, other),
        }
    }
}

impl Record for OrderLine {
    fn field(&self, path: &str) -> Option<Value> {
        match path {
            "id" => Some(self.id.into()),
            "orderId" => Some(self.order_id.into()),
            "sku" => Some(self.sku.clone().into()),
            other => stamp(&self.ts, other),
        }
    }
}

impl Record for Note {
    fn field(&self, path: &str) -> Option<Value> {
        match path {
            "id" => Some(self.id.into()),
            other => stamp(&self.ts, other),
        }
    }
}

impl Record for User {
    fn field(&self, path: &str) -> Option<Value> {
        match path {
            "id" => Some(self.id.into()),
            "login" => Some(self.login.clone().into()),
            other => stamp(&self.ts, other),
        }
    }
}

pub fn customer(id: i64, first: &str, last: &str, age: i64) -> Customer {
    Customer {
        id,
        first_name: first.into(),
        last_name: last.into(),
        age,
        email: None,
        address: None,
        ts: Timestamps::default(),
        orders: None,
    }
}

pub fn order(id: i64, customer_id: i64) -> Order {
    Order {
        id,
        customer_id,
        number: format!("SO-{id}"),
        ts: Timestamps::default(),
        lines: None,
    }
}

pub fn line(id: i64, order_id: i64) -> OrderLine {
    OrderLine {
        id,
        order_id,
        sku: format!("SKU-{id}"),
        ts: Timestamps::default(),
    }
}

pub fn customer_fields() -> FieldSet {
    FieldSet::new()
        .insert("id", FieldKind::I64)
        .insert("firstName", FieldKind::String)
        .insert("lastName", FieldKind::String)
        .insert("age", FieldKind::I64)
        .insert("email", FieldKind::String)
        .insert("address.city", FieldKind::String)
        .insert_path("createdAt", "timestamps.created_at", FieldKind::DateTimeUtc)
}

pub fn order_fields() -> FieldSet {
    FieldSet::new()
        .insert("id", FieldKind::I64)
        .insert("customerId", FieldKind::I64)
        .insert("number", FieldKind::String)
}

/// Customer -> orders -> lines cascade; customer -> notes is restricted;
/// user -> profile is one-to-one.
pub fn registry(store: &Arc<MemoryStore>) -> RelationRegistry {
    let orders = store.clone();
    let lines = store.clone();
    let notes = store.clone();
    let profiles = store.clone();

    RelationRegistry::new()
        .with::<Customer>(
            Relation::many::<Customer, Order>("orders")
                .load_with(move |customer_id: i64| {
                    let store = orders.clone();
                    async move { Ok(store.scan::<Order>(true, |o| o.customer_id == customer_id)) }
                })
                .materialized(|c: &Customer| c.orders.clone())
                .build(),
        )
        .with::<Customer>(
            Relation::many::<Customer, Note>("notes")
                .on_delete(DeletePolicy::Restrict)
                .load_with(move |customer_id: i64| {
                    let store = notes.clone();
                    async move { Ok(store.scan::<Note>(true, |n| n.customer_id == customer_id)) }
                })
                .build(),
        )
        .with::<Order>(Relation::belongs_to::<Order, Customer>("customer").build())
        .with::<Order>(
            Relation::many::<Order, OrderLine>("lines")
                .load_with(move |order_id: i64| {
                    let store = lines.clone();
                    async move { Ok(store.scan::<OrderLine>(true, |l| l.order_id == order_id)) }
                })
                .materialized(|o: &Order| o.lines.clone())
                .build(),
        )
        .with::<OrderLine>(Relation::belongs_to::<OrderLine, Order>("order").build())
        .with::<User>(
            Relation::one::<User, Profile>("profile")
                .load_one_with(move |user_id: i64| {
                    let store = profiles.clone();
                    async move {
                        Ok(store
                            .scan::<Profile>(true, |p| p.user_id == user_id)
                            .into_iter()
                            .next())
                    }
                })
                .build(),
        )
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub customers: Repository<Customer, MemoryStore>,
    pub orders: Repository<Order, MemoryStore>,
    pub lines: Repository<OrderLine, MemoryStore>,
    pub notes: Repository<Note, MemoryStore>,
    pub users: Repository<User, MemoryStore>,
}

pub fn fixture() -> Fixture {
    fixture_with(RepositoryConfig::default())
}

pub fn fixture_with(config: RepositoryConfig) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let relations = Arc::new(registry(&store));
    Fixture {
        customers: Repository::new(store.clone(), customer_fields(), relations.clone(), config),
        orders: Repository::new(store.clone(), order_fields(), relations.clone(), config),
        lines: Repository::new(
            store.clone(),
            FieldSet::new().insert("sku", FieldKind::String),
            relations.clone(),
            config,
        ),
        notes: Repository::new(store.clone(), FieldSet::new(), relations.clone(), config),
        users: Repository::new(
            store.clone(),
            FieldSet::new().insert("login", FieldKind::String),
            relations,
            config,
        ),
        store,
    }
}

pub fn people() -> Vec<Customer> {
    vec![
        customer(1, "Ann", "Smith", 34),
        customer(2, "Bob", "Jones", 17),
        customer(3, "Cid", "Smith", 65),
        customer(4, "Dee", "Adams", 18),
        customer(5, "Eve", "Jones", 64),
        customer(6, "Abe", "Smith", 40),
    ]
}
