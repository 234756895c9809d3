//! Test fixtures and database helpers.
//!
//! Provides the document types shared by the integration suites and
//! convenience functions for opening test databases over each backend.

use std::fmt;
use std::sync::Arc;

use polydb_core::{
    CaseInsensitive, Config, Database, DatabaseBuilder, Document, InMemoryBackend, NoIdentity,
    SecondaryIndex, TypeUniverse,
};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use uuid::Uuid;

macro_rules! identified_by {
    ($ty:ty, $name:literal, $field:ident: $id:ty) => {
        impl Document for $ty {
            const TYPE_NAME: &'static str = $name;
            type Id = $id;

            fn id_field(&self) -> Option<&$id> {
                Some(&self.$field)
            }

            fn id_field_mut(&mut self) -> Option<&mut $id> {
                Some(&mut self.$field)
            }
        }
    };
}

/// A person with a string identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Identity, assigned on first save.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Age in years.
    pub age: u32,
}

impl Person {
    /// A person without an identity yet.
    pub fn new(name: &str, age: u32) -> Self {
        Self {
            id: String::new(),
            name: name.to_string(),
            age,
        }
    }

    /// A person with a fixed identity.
    pub fn with_id(id: &str, name: &str, age: u32) -> Self {
        Self {
            id: id.to_string(),
            ..Self::new(name, age)
        }
    }
}

identified_by!(Person, "testkit.Person", id: String);

/// Base view over the animal family.
pub trait Animal: Send + Sync + fmt::Debug {
    /// Identity of the underlying document.
    fn id(&self) -> &str;
    /// The animal's name.
    fn name(&self) -> &str;
    /// What it says.
    fn sound(&self) -> &'static str;
}

/// A cat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cat {
    /// Identity.
    pub id: String,
    /// Name.
    pub name: String,
    /// Remaining lives.
    pub lives: u8,
}

/// A dog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dog {
    /// Identity.
    pub id: String,
    /// Name.
    pub name: String,
    /// Whether it is a good boy.
    pub good: bool,
}

/// A cow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cow {
    /// Identity.
    pub id: String,
    /// Name.
    pub name: String,
    /// Daily yield.
    pub litres_per_day: f32,
}

identified_by!(Cat, "testkit.zoo.Cat", id: String);
identified_by!(Dog, "testkit.zoo.Dog", id: String);
identified_by!(Cow, "testkit.zoo.Cow", id: String);

impl Animal for Cat {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn sound(&self) -> &'static str {
        "meow"
    }
}

impl Animal for Dog {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn sound(&self) -> &'static str {
        "woof"
    }
}

impl Animal for Cow {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn sound(&self) -> &'static str {
        "moo"
    }
}

/// One animal of each kind, without identities.
pub fn farm() -> (Cat, Dog, Cow) {
    (
        Cat {
            id: String::new(),
            name: "Felix".into(),
            lives: 9,
        },
        Dog {
            id: String::new(),
            name: "Rex".into(),
            good: true,
        },
        Cow {
            id: String::new(),
            name: "Daisy".into(),
            litres_per_day: 28.5,
        },
    )
}

/// A document without an identity field; identified by its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Name.
    pub name: String,
    /// Age.
    pub age: u32,
}

impl Document for Note {
    const TYPE_NAME: &'static str = "testkit.Note";
    type Id = NoIdentity;
}

/// A document identified by a UUID; nil means unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    /// Identity.
    pub id: Uuid,
    /// Holder.
    pub holder: String,
}

identified_by!(Badge, "testkit.Badge", id: Uuid);

/// A document identified by an optional UUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Identity.
    pub id: Option<Uuid>,
    /// Scope.
    pub scope: String,
}

identified_by!(Token, "testkit.Token", id: Option<Uuid>);

/// A document identified by a caller-supplied number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Identity; never generated.
    pub number: Option<i64>,
    /// Subject.
    pub subject: String,
}

identified_by!(Ticket, "testkit.Ticket", number: Option<i64>);

/// Universe with every fixture type registered.
pub fn universe() -> TypeUniverse {
    TypeUniverse::builder()
        .register::<Person>()
        .register::<Cat>()
        .register::<Dog>()
        .register::<Cow>()
        .register::<Note>()
        .register::<Badge>()
        .register::<Token>()
        .register::<Ticket>()
        .assignable::<Cat, Box<dyn Animal>>(|cat| Box::new(cat))
        .assignable::<Dog, Box<dyn Animal>>(|dog| Box::new(dog))
        .assignable::<Cow, Box<dyn Animal>>(|cow| Box::new(cow))
        .build()
        .expect("fixture universe is valid")
}

/// Case-insensitive name index.
pub type NameIndex = SecondaryIndex<Person, String, CaseInsensitive>;

/// Name index (case-insensitive) that only admits people aged 13 or over.
pub fn teen_name_index() -> Arc<NameIndex> {
    Arc::new(
        SecondaryIndex::builder("person_by_name", |p: &Person| p.name.clone())
            .include(|p| p.age >= 13)
            .comparer(CaseInsensitive)
            .build(),
    )
}

/// Backend variants a test database can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// [`InMemoryBackend`].
    Memory,
    /// File-system backend, read directly.
    FileSystem,
    /// File-system backend behind the in-memory mirror.
    WriteThrough,
}

impl BackendKind {
    /// Every variant.
    pub const ALL: [BackendKind; 3] = [Self::Memory, Self::FileSystem, Self::WriteThrough];
}

/// A test database with automatic cleanup.
pub struct TestDatabase {
    /// The database instance.
    pub db: Database,
    kind: BackendKind,
    memory: Arc<InMemoryBackend>,
    temp_dir: TempDir,
}

impl TestDatabase {
    /// Opens an empty database on `kind` with no indexes.
    pub fn new(kind: BackendKind) -> Self {
        Self::with(kind, |builder| builder)
    }

    /// Opens an empty database on `kind`, letting `configure` attach indexes
    /// or swap collaborators.
    pub fn with<F>(kind: BackendKind, configure: F) -> Self
    where
        F: FnOnce(DatabaseBuilder) -> DatabaseBuilder,
    {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let memory = Arc::new(InMemoryBackend::new());
        let db = Self::open_db(kind, &memory, &temp_dir, configure);
        Self {
            db,
            kind,
            memory,
            temp_dir,
        }
    }

    /// Closes the database and opens a new one over the same storage.
    pub fn reopen<F>(self, configure: F) -> Self
    where
        F: FnOnce(DatabaseBuilder) -> DatabaseBuilder,
    {
        let Self {
            db,
            kind,
            memory,
            temp_dir,
        } = self;
        drop(db);
        let db = Self::open_db(kind, &memory, &temp_dir, configure);
        Self {
            db,
            kind,
            memory,
            temp_dir,
        }
    }

    fn open_db<F>(
        kind: BackendKind,
        memory: &Arc<InMemoryBackend>,
        temp_dir: &TempDir,
        configure: F,
    ) -> Database
    where
        F: FnOnce(DatabaseBuilder) -> DatabaseBuilder,
    {
        let builder = Database::builder(universe());
        let builder = match kind {
            BackendKind::Memory => builder.shared_backend(memory.clone()),
            BackendKind::FileSystem => builder
                .file_system(temp_dir.path())
                .config(Config::default().write_through(false)),
            BackendKind::WriteThrough => builder
                .file_system(temp_dir.path())
                .config(Config::default().write_through(true)),
        };
        configure(builder)
            .open()
            .expect("Failed to open test database")
    }

    /// Splits into a shareable database and the directory keeping its
    /// file-system storage alive.
    pub fn into_shared(self) -> (Arc<Database>, TempDir) {
        (Arc::new(self.db), self.temp_dir)
    }

    /// Backend variant.
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Root directory of the file-system variants.
    pub fn root(&self) -> &std::path::Path {
        self.temp_dir.path()
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Runs a test with a temporary in-memory database.
///
/// # Example
///
/// ```rust,ignore
/// use polydb_testkit::with_temp_db;
///
/// #[test]
/// fn my_test() {
///     with_temp_db(|db| {
///         db.save(&mut Person::new("Ronnie", 29)).unwrap();
///     });
/// }
/// ```
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database) -> R,
{
    let test_db = TestDatabase::new(BackendKind::Memory);
    f(&test_db)
}

/// Runs a test once against every backend variant.
pub fn on_every_backend<F>(mut f: F)
where
    F: FnMut(TestDatabase),
{
    for kind in BackendKind::ALL {
        f(TestDatabase::new(kind));
    }
}
