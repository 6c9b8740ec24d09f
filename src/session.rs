//! Sessions: caches of builder generators keyed by type.
//!
//! A session hands out the builder for each type a build meets. Builders for types without
//! a registered generator are derived from the type descriptor on first use and cached, so a
//! session can be shared between many builds (and threads) without rebuilding field tables.

use std::fmt;
use std::sync::{Arc, LazyLock};

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::builder::{BuildEnv, Builder};
use crate::context::BuildContext;
use crate::options::BuilderOptions;
use crate::tracing_macros::debug;
use crate::types::{Shape, TypeDescriptor};

/// Produces the builder for one type.
#[derive(Clone)]
pub struct BuilderGenerator(Arc<dyn Fn() -> Builder + Send + Sync>);

impl BuilderGenerator {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> Builder + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// A generator that always returns a clone of `builder`.
    pub fn from_builder(builder: Builder) -> Self {
        Self::new(move || builder.clone())
    }

    pub fn generate(&self) -> Builder {
        (self.0)()
    }
}

impl fmt::Debug for BuilderGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BuilderGenerator")
    }
}

struct SessionInner {
    generators: RwLock<AHashMap<TypeDescriptor, BuilderGenerator>>,
}

/// Registry of builder generators. Cheap to clone; clones share the registry.
///
/// ```rust
/// use concise_builder::{Builder, Event, Session, TypeDescriptor, Value};
///
/// let session = Session::new();
/// let ty = TypeDescriptor::list(TypeDescriptor::string());
/// let mut ctx = session.new_build(&ty, Default::default());
/// concise_builder::replay(
///     &[Event::List, Event::string("a"), Event::End],
///     &mut ctx,
/// ).unwrap();
/// assert_eq!(ctx.into_built_object().unwrap(), Value::List(vec![Value::from("a")]));
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

static DEFAULT_SESSION: LazyLock<Session> = LazyLock::new(Session::empty);

/// Types whose builder can be cached: anything but a record still waiting for its fields.
fn is_settled(ty: &TypeDescriptor) -> bool {
    match ty.shape() {
        Shape::Record(record) => record.is_defined(),
        _ => true,
    }
}

impl Session {
    /// A session seeded with every generator the process-wide default session holds.
    pub fn new() -> Self {
        Self::with_parent(&DEFAULT_SESSION)
    }

    /// A session seeded with a snapshot of `parent`'s generators. Later registrations on
    /// either side are not shared.
    pub fn with_parent(parent: &Session) -> Self {
        let snapshot = parent.inner.generators.read().clone();
        Self {
            inner: Arc::new(SessionInner {
                generators: RwLock::new(snapshot),
            }),
        }
    }

    /// A session with no generators at all.
    pub fn empty() -> Self {
        Self {
            inner: Arc::new(SessionInner {
                generators: RwLock::new(AHashMap::new()),
            }),
        }
    }

    /// The process-wide session that [`Session::new`] copies from.
    pub fn default_session() -> &'static Session {
        &DEFAULT_SESSION
    }

    /// The generator for `ty`, deriving and caching the default one if none is registered.
    pub fn generator_for_type(&self, ty: &TypeDescriptor) -> BuilderGenerator {
        if let Some(generator) = self.inner.generators.read().get(ty) {
            return generator.clone();
        }
        let generator = BuilderGenerator::from_builder(Builder::for_type(ty));
        if !is_settled(ty) {
            return generator;
        }
        let mut generators = self.inner.generators.write();
        // Another thread may have registered one between the two locks.
        generators
            .entry(ty.clone())
            .or_insert_with(|| {
                debug!(target_type = %ty, "caching default builder");
                generator
            })
            .clone()
    }

    /// Register (or replace) the generator for `ty`.
    pub fn register_generator_for_type<F>(&self, ty: &TypeDescriptor, generator: F)
    where
        F: Fn() -> Builder + Send + Sync + 'static,
    {
        debug!(target_type = %ty, "registering builder generator");
        self.inner
            .generators
            .write()
            .insert(ty.clone(), BuilderGenerator::new(generator));
    }

    pub fn builder_for_type(&self, ty: &TypeDescriptor) -> Builder {
        self.generator_for_type(ty).generate()
    }

    /// Start building a value of type `target`.
    pub fn new_build(&self, target: &TypeDescriptor, options: BuilderOptions) -> BuildContext {
        let env = BuildEnv::new(self.clone(), options);
        let root = env.builder_for(target);
        BuildContext::new(env, root)
    }

    /// Number of cached or registered generators.
    pub fn len(&self) -> usize {
        self.inner.generators.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, ty: &TypeDescriptor) -> bool {
        self.inner.generators.read().contains_key(ty)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("generators", &self.len()).finish()
    }
}
