//! Active Record behaviour against a real SQLite database.
//!
//! Each test declares its own entity types: global scopes, permissions and
//! caches are registered per type and shared by the whole test binary.

use std::sync::{Arc, LazyLock};

use pretty_assertions::assert_eq;
use rowkeeper::cache::{CacheStats, MemoryCache, ObjectCache};
use rowkeeper::connection::MemoryConfigSource;
use rowkeeper::error::ErrorCode;
use rowkeeper::prelude::*;
use rowkeeper::record::{add_global_scope, set_manage_permission};
use rowkeeper::session::MemorySession;
use rowkeeper::tasks::{create_table, insert_data};

macro_rules! entity {
    ($name:ident, $schema:expr) => {
        #[derive(Debug)]
        struct $name(Record);

        impl ActiveRecord for $name {
            const SCHEMA: EntitySchema = $schema;

            fn from_record(record: Record) -> Self {
                Self(record)
            }
            fn record(&self) -> &Record {
                &self.0
            }
            fn record_mut(&mut self) -> &mut Record {
                &mut self.0
            }
        }
    };
}

fn open() -> TransactionManager {
    let configs = MemoryConfigSource::new().with("app", DatabaseConfig::sqlite(":memory:"));
    let mut tx = TransactionManager::new(Arc::new(rowkeeper::connection_manager(configs)));
    tx.open("app").unwrap();
    tx
}

fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

entity!(
    Customer,
    EntitySchema::new("Customer", "customer", "id")
        .attributes(&["name", "email"])
        .created_at("created_at")
        .created_by("created_by")
        .updated_at("updated_at")
        .deleted_at("deleted_at")
);

fn customer_table(tx: &TransactionManager) {
    create_table(
        tx,
        "customer",
        &[
            ("id", "INTEGER PRIMARY KEY"),
            ("name", "TEXT"),
            ("email", "TEXT"),
            ("created_at", "TEXT"),
            ("created_by", "INTEGER"),
            ("updated_at", "TEXT"),
            ("deleted_at", "TEXT"),
        ],
    )
    .unwrap();
}

#[test]
fn test_store_inserts_then_updates() {
    let mut tx = open();
    tx.set_session(Some(Arc::new(MemorySession::new().with("userid", 7))));
    customer_table(&tx);

    let mut customer = Customer::new();
    customer.set("name", "Ana");
    customer.set("email", "ana@example.com");
    // not whitelisted and not a column of the table
    customer.set("nickname", "Aninha");
    customer.store(&tx).unwrap();
    assert_eq!(customer.id(), Some(Value::Int(1)));

    let loaded = Customer::load(&tx, 1).unwrap();
    assert_eq!(loaded.get("name"), Value::from("Ana"));
    assert_eq!(loaded.get("created_by"), Value::Int(7));
    assert!(!loaded.get("created_at").is_null());
    assert!(loaded.get("updated_at").is_null());

    let mut loaded = loaded;
    loaded.set("name", "Ana Paula");
    loaded.store(&tx).unwrap();

    let mut all = Repository::<Customer>::new();
    assert_eq!(all.count(&tx).unwrap(), 1);
    let reloaded = Customer::load(&tx, 1).unwrap();
    assert_eq!(reloaded.get("name"), Value::from("Ana Paula"));
    assert!(!reloaded.get("updated_at").is_null());
}

#[test]
fn test_soft_delete_restore_and_force_delete() {
    let tx = open();
    customer_table(&tx);

    let mut customer = Customer::new();
    customer.set("name", "Bia");
    customer.store(&tx).unwrap();
    let id = customer.id().unwrap();

    customer.delete(&tx).unwrap();
    assert!(customer.is_trashed());
    assert!(Customer::find(&tx, id.clone()).unwrap().is_none());
    assert!(Customer::find_with_trashed(&tx, id.clone()).unwrap().unwrap().is_trashed());
    assert_eq!(Repository::<Customer>::new().count(&tx).unwrap(), 0);
    assert_eq!(Repository::<Customer>::new().with_trashed().count(&tx).unwrap(), 1);
    assert_eq!(Repository::<Customer>::new().only_trashed().count(&tx).unwrap(), 1);

    customer.restore(&tx).unwrap();
    assert!(Customer::find(&tx, id.clone()).unwrap().is_some());

    customer.force_delete(&tx).unwrap();
    assert!(Customer::find_with_trashed(&tx, id.clone()).unwrap().is_none());
    assert!(Customer::load(&tx, id).unwrap_err().is_not_found());
}

entity!(Product, EntitySchema::new("Product", "product", "id"));

#[test]
fn test_global_scope_wraps_or_conditions() {
    let tx = open();
    create_table(
        &tx,
        "product",
        &[("id", "INTEGER PRIMARY KEY"), ("name", "TEXT"), ("price", "INTEGER"), ("active", "INTEGER")],
    )
    .unwrap();
    for (id, name, price, active) in [(1, "a", 10, true), (2, "b", 5, false), (3, "c", 50, true)] {
        insert_data(
            &tx,
            "product",
            &row(&[
                ("id", Value::from(id)),
                ("name", Value::from(name)),
                ("price", Value::from(price)),
                ("active", Value::from(active)),
            ]),
        )
        .unwrap();
    }
    assert!(add_global_scope::<Product>("active", Filter::eq("active", true)));

    let names = |products: Vec<Product>| -> Vec<Value> { products.iter().map(|p| p.get("name")).collect() };

    let scoped = Repository::<Product>::new()
        .where_("price", "<", 20)
        .or_where("name", "=", "b")
        .order_by("id", SortOrder::Asc)
        .load(&tx)
        .unwrap();
    assert_eq!(names(scoped), vec![Value::from("a")]);

    let unscoped = Repository::<Product>::new()
        .where_("price", "<", 20)
        .or_where("name", "=", "b")
        .without_global_scope("active")
        .order_by("id", SortOrder::Asc)
        .load(&tx)
        .unwrap();
    assert_eq!(names(unscoped), vec![Value::from("a"), Value::from("b")]);
}

entity!(Contract, EntitySchema::new("Contract", "contract", "id"));

#[test]
fn test_manage_permission_blocks_delete() {
    let tx = open();
    create_table(&tx, "contract", &[("id", "INTEGER PRIMARY KEY"), ("status", "TEXT")]).unwrap();
    set_manage_permission::<Contract, _>(|operation, record| {
        operation != Operation::Delete || record.get("status") != Some(&Value::from("signed"))
    });

    let mut contract = Contract::new();
    contract.set("status", "signed");
    contract.store(&tx).unwrap();

    let err = contract.delete(&tx).unwrap_err();
    assert_eq!(err.code, ErrorCode::PermissionDenied);
    assert!(Contract::exists(&tx, 1).unwrap());
}

struct Ticket(Record);

static TICKET_CACHE: LazyLock<Arc<MemoryCache>> = LazyLock::new(|| Arc::new(MemoryCache::new()));

impl ActiveRecord for Ticket {
    const SCHEMA: EntitySchema = EntitySchema::new("Ticket", "ticket", "id").id_policy(IdPolicy::Serial);

    fn from_record(record: Record) -> Self {
        Self(record)
    }
    fn record(&self) -> &Record {
        &self.0
    }
    fn record_mut(&mut self) -> &mut Record {
        &mut self.0
    }
    fn cache() -> Option<Arc<dyn ObjectCache>> {
        Some(TICKET_CACHE.clone())
    }
}

#[test]
fn test_cache_answers_reads_until_delete() {
    let tx = open();
    create_table(&tx, "ticket", &[("id", "INTEGER PRIMARY KEY AUTOINCREMENT"), ("subject", "TEXT")]).unwrap();

    let mut ticket = Ticket::new();
    ticket.set("subject", "Printer on fire");
    ticket.store(&tx).unwrap();
    let id = ticket.id().unwrap();
    assert_eq!(id, Value::Int(1));

    let cached = Ticket::find(&tx, id.clone()).unwrap().unwrap();
    assert_eq!(cached.get("subject"), Value::from("Printer on fire"));

    ticket.delete(&tx).unwrap();
    assert!(Ticket::find(&tx, id).unwrap().is_none());

    assert_eq!(
        TICKET_CACHE.stats(),
        CacheStats {
            hits: 1,
            misses: 1,
            writes: 1,
            deletes: 1
        }
    );
}

entity!(Author, EntitySchema::new("Author", "author", "id"));
entity!(Book, EntitySchema::new("Book", "book", "id"));
entity!(Tag, EntitySchema::new("Tag", "tag", "id"));
entity!(BookTag, EntitySchema::new("BookTag", "book_tag", "id"));

#[test]
fn test_relations() {
    let tx = open();
    create_table(&tx, "author", &[("id", "INTEGER PRIMARY KEY"), ("name", "TEXT")]).unwrap();
    create_table(&tx, "book", &[("id", "INTEGER PRIMARY KEY"), ("author_id", "INTEGER"), ("title", "TEXT")]).unwrap();
    create_table(&tx, "tag", &[("id", "INTEGER PRIMARY KEY"), ("label", "TEXT")]).unwrap();
    create_table(&tx, "book_tag", &[("id", "INTEGER PRIMARY KEY"), ("book_id", "INTEGER"), ("tag_id", "INTEGER")]).unwrap();

    let mut author = Author::new();
    author.set("name", "Erico");
    author.store(&tx).unwrap();

    for title in ["Incidente", "Olhai"] {
        let mut book = Book::new();
        book.set("title", title);
        book.set("author_id", author.id().unwrap());
        book.store(&tx).unwrap();
    }
    let books: Vec<Book> = author.has_many(&tx, "author_id").unwrap();
    assert_eq!(books.len(), 2);

    let parent: Option<Author> = books[0].belongs_to(&tx, "author_id").unwrap();
    assert_eq!(parent.unwrap().get("name"), Value::from("Erico"));

    let mut tag_ids = Vec::new();
    for label in ["novel", "classic"] {
        let mut tag = Tag::new();
        tag.set("label", label);
        tag.store(&tx).unwrap();
        tag_ids.push(tag.id().unwrap());
    }

    books[0].save_aggregate::<BookTag>(&tx, "book_id", "tag_id", &tag_ids).unwrap();
    let tags: Vec<Tag> = books[0].belongs_to_many::<Tag, BookTag>(&tx, "book_id", "tag_id").unwrap();
    let labels: Vec<Value> = tags.iter().map(|t| t.get("label")).collect();
    assert_eq!(labels, vec![Value::from("novel"), Value::from("classic")]);

    books[0].save_aggregate::<BookTag>(&tx, "book_id", "tag_id", &tag_ids[1..]).unwrap();
    let tags: Vec<Tag> = books[0].load_aggregate::<Tag, BookTag>(&tx, "book_id", "tag_id").unwrap();
    assert_eq!(tags.len(), 1);

    let mut replacement = Book::new();
    replacement.set("title", "O Tempo e o Vento");
    author.save_composite(&tx, "author_id", &mut [replacement]).unwrap();
    let books: Vec<Book> = author.load_composite(&tx, "author_id").unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].get("title"), Value::from("O Tempo e o Vento"));
}

entity!(Invoice, EntitySchema::new("Invoice", "invoice", "id"));

#[test]
fn test_pagination_and_aggregates() {
    let tx = open();
    create_table(
        &tx,
        "invoice",
        &[("id", "INTEGER PRIMARY KEY"), ("state", "TEXT"), ("amount", "INTEGER")],
    )
    .unwrap();
    for id in 1..=25_i64 {
        let state = if id % 2 == 0 { "RS" } else { "SC" };
        insert_data(
            &tx,
            "invoice",
            &row(&[("id", Value::from(id)), ("state", Value::from(state)), ("amount", Value::from(id * 10))]),
        )
        .unwrap();
    }

    let page = Repository::<Invoice>::new()
        .order_by("id", SortOrder::Asc)
        .take(10)
        .skip(20)
        .load(&tx)
        .unwrap();
    let ids: Vec<Value> = page.iter().map(|i| i.get("id")).collect();
    assert_eq!(ids, (21..=25).map(Value::Int).collect::<Vec<_>>());

    let last = Repository::<Invoice>::new().order_by("id", SortOrder::Asc).last(&tx).unwrap();
    assert_eq!(last.unwrap().get("id"), Value::Int(25));

    let mut repo = Repository::<Invoice>::new().where_("state", "=", "RS");
    assert_eq!(repo.count(&tx).unwrap(), 12);
    assert_eq!(
        Repository::<Invoice>::new().sum_by(&tx, "amount", None).unwrap().value(),
        Some(&Value::Int(3250))
    );
    assert_eq!(
        Repository::<Invoice>::new().max_by(&tx, "id", None).unwrap().value(),
        Some(&Value::Int(25))
    );

    let per_state = Repository::<Invoice>::new()
        .group_by("state")
        .order_by("state", SortOrder::Asc)
        .count_by(&tx, "*", Some("total"))
        .unwrap()
        .into_rows();
    assert_eq!(per_state.len(), 2);
    assert_eq!(per_state[0].get("state"), Some(&Value::from("RS")));
    assert_eq!(per_state[0].get("total"), Some(&Value::Int(12)));

    let updated = Repository::<Invoice>::new()
        .where_("state", "=", "SC")
        .set("amount", 0)
        .update(&tx)
        .unwrap();
    assert_eq!(updated, 13);
    assert_eq!(
        Repository::<Invoice>::new().sum_by(&tx, "amount", None).unwrap().value(),
        Some(&Value::Int(1560))
    );
}
