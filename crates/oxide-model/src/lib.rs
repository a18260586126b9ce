//! # oxide-model
//!
//! Entity metadata for an object-relational mapper, built by conventions.
//!
//! This crate provides:
//! - A mutable metadata graph of entity types, properties, keys and foreign
//!   keys, where every setting remembers who made it
//!   ([`ConfigurationSource`])
//! - Conventions that react to changes in the graph, most notably
//!   relationship discovery, which pairs navigation members into foreign
//!   keys and records ambiguity instead of guessing
//! - Validation and freezing into a read-only [`FrozenModel`]
//!
//! ## Building a model
//!
//! Types are described by [`reflect::TypeInfo`], usually produced by
//! `#[derive(Reflect)]` from `oxide-model-derive`:
//!
//! ```rust
//! use oxide_model::reflect::{MemberInfo, PrimitiveType, TypeInfo};
//! use oxide_model::ModelBuilder;
//!
//! let mut builder = ModelBuilder::new();
//! builder
//!     .register_type(
//!         TypeInfo::new("Blog")
//!             .member(MemberInfo::primitive("Id", PrimitiveType::Int32))
//!             .member(MemberInfo::collection("Posts", "Post")),
//!     )
//!     .register_type(
//!         TypeInfo::new("Post")
//!             .member(MemberInfo::primitive("Id", PrimitiveType::Int32))
//!             .member(MemberInfo::primitive("BlogId", PrimitiveType::Int32))
//!             .member(MemberInfo::reference("Blog", "Blog")),
//!     );
//! builder.entity_type("Blog").unwrap();
//!
//! let model = builder.finish().unwrap();
//! let fk = &model.foreign_keys()[0];
//! assert_eq!(fk.dependent, "Post");
//! assert_eq!(fk.properties, ["BlogId"]);
//! ```
//!
//! ## Precedence
//!
//! A mutation made from a weaker source than the one that set the current
//! value returns [`Outcome::Rejected`] and leaves the model untouched.
//! Explicit configuration always wins over annotations, which win over
//! conventions.

pub mod builder;
pub mod conventions;
pub mod error;
pub mod frozen;
pub mod model;
pub mod reflect;
pub mod source;

pub use builder::ModelBuilder;
pub use error::{ModelError, Result};
pub use frozen::{FrozenEntityType, FrozenForeignKey, FrozenIndex, FrozenModel, FrozenProperty};
pub use model::{DeleteBehavior, EntityTypeId, ForeignKeyId, Model, ModelDiagnostic};
pub use reflect::{Reflect, TypeRegistry};
pub use source::{ConfigurationSource, Outcome};
