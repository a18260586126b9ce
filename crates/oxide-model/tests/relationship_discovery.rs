//! Relationship discovery over derived type descriptions.

#![allow(dead_code)]

use oxide_model::model::ValueGenerated;
use oxide_model::reflect::{MemberType, PrimitiveType, Reflect};
use oxide_model::{ConfigurationSource, DeleteBehavior, ModelBuilder, ModelDiagnostic, ModelError, Outcome};
use oxide_model_derive::Reflect;

#[derive(Reflect)]
struct Blog {
    id: i32,
    url: Option<String>,
    posts: Vec<Post>,
}

#[derive(Reflect)]
struct Post {
    id: i32,
    title: String,
    blog_id: i32,
    blog: Option<Box<Blog>>,
}

#[derive(Reflect)]
struct Person {
    id: i32,
    name: String,
    authored_articles: Vec<Article>,
    edited_articles: Vec<Article>,
}

#[derive(Reflect)]
struct Article {
    id: i32,
    author: Option<Box<Person>>,
    editor: Option<Box<Person>>,
}

#[derive(Reflect)]
struct Order {
    id: i64,
    shipping: Address,
    billing: Address,
    #[reflect(not_mapped)]
    total: f64,
}

#[derive(Reflect)]
struct Address {
    street: String,
    city: Option<String>,
}

#[derive(Reflect)]
struct Course {
    id: i32,
    students: Vec<Student>,
}

#[derive(Reflect)]
struct Student {
    id: i32,
    courses: Vec<Course>,
}

/// `Post` points at `Blog`, which has no navigation back.
mod one_way {
    use oxide_model_derive::Reflect;

    #[derive(Reflect)]
    pub struct Blog {
        pub id: i32,
        pub url: Option<String>,
    }

    #[derive(Reflect)]
    pub struct Post {
        pub id: i32,
        pub blog_id: i32,
        pub blog: Option<Box<Blog>>,
    }
}

/// Two references from `Doc` compete for the single `Posts` collection.
mod competing {
    use oxide_model_derive::Reflect;

    #[derive(Reflect)]
    pub struct Person {
        pub id: i32,
        pub posts: Vec<Doc>,
    }

    #[derive(Reflect)]
    pub struct Doc {
        pub id: i32,
        pub author: Option<Box<Person>>,
        pub editor: Option<Box<Person>>,
    }
}

fn navigation_pairs(model: &oxide_model::FrozenModel) -> Vec<(Option<String>, Option<String>)> {
    let mut pairs: Vec<_> = model
        .foreign_keys()
        .iter()
        .map(|fk| (fk.dependent_to_principal.clone(), fk.principal_to_dependent.clone()))
        .collect();
    pairs.sort();
    pairs
}

fn ambiguous_members(builder: &ModelBuilder, name: &str) -> Vec<String> {
    let model = builder.model();
    model
        .entity_types()
        .find(|et| et.display_name() == name)
        .and_then(|et| et.ambiguous_navigations())
        .map(|map| map.keys().map(|member| member.name.clone()).collect())
        .unwrap_or_default()
}

#[test]
fn test_derive_describes_members() {
    let info = Post::type_info();
    assert_eq!(info.name, "Post");
    let names: Vec<_> = info.members.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["Id", "Title", "BlogId", "Blog"]);
    let blog = info.members.iter().find(|m| m.name == "Blog").unwrap();
    assert!(blog.nullable);
    match &blog.member_type {
        MemberType::Reference(target) => assert_eq!(target, "Blog"),
        other => panic!("Expected Reference, got {other:?}"),
    }
    let order = Order::type_info();
    let total = order.members.iter().find(|m| m.name == "Total").unwrap();
    assert!(total.not_mapped);
    assert_eq!(total.member_type, MemberType::Primitive(PrimitiveType::Float64));
}

#[test]
fn test_blog_post_single_relationship() {
    let mut builder = ModelBuilder::new();
    builder.entity::<Blog>().unwrap();
    builder.entity::<Post>().unwrap();
    let model = builder.finish().unwrap();

    assert_eq!(model.foreign_keys().len(), 1);
    let fk = &model.foreign_keys()[0];
    assert_eq!(fk.dependent, "Post");
    assert_eq!(fk.principal, "Blog");
    assert_eq!(fk.properties, ["BlogId"]);
    assert_eq!(fk.principal_key, ["Id"]);
    assert_eq!(fk.dependent_to_principal.as_deref(), Some("Blog"));
    assert_eq!(fk.principal_to_dependent.as_deref(), Some("Posts"));
    assert!(fk.required);
    assert!(!fk.unique);
    assert_eq!(fk.delete_behavior, DeleteBehavior::Cascade);

    let blog = model.find_entity_type("Blog").unwrap();
    assert_eq!(blog.primary_key, ["Id"]);
    assert_eq!(blog.properties[0].value_generated, ValueGenerated::OnAdd);
    assert!(blog.find_property("Posts").is_none());
}

#[test]
fn test_discovery_is_order_independent() {
    let mut forward = ModelBuilder::new();
    forward.entity::<Blog>().unwrap();
    forward.entity::<Post>().unwrap();

    let mut backward = ModelBuilder::new();
    backward.entity::<Post>().unwrap();
    backward.entity::<Blog>().unwrap();

    assert_eq!(forward.finish().unwrap(), backward.finish().unwrap());
}

#[test]
fn test_repeated_configuration_is_idempotent() {
    let mut builder = ModelBuilder::new();
    builder.entity::<Blog>().unwrap();
    let post = builder.entity::<Post>().unwrap();
    let first = builder
        .has_relationship(post, "Blog", Some("Posts"))
        .unwrap()
        .applied()
        .unwrap();
    let second = builder
        .has_relationship(post, "Blog", Some("Posts"))
        .unwrap()
        .applied()
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(builder.model().foreign_keys().count(), 1);
}

#[test]
fn test_crossed_navigations_are_reported_and_left_unpaired() {
    let mut builder = ModelBuilder::new();
    builder.entity::<Person>().unwrap();
    builder.entity::<Article>().unwrap();

    assert_eq!(builder.model().foreign_keys().count(), 0);
    assert!(builder
        .model()
        .diagnostics()
        .iter()
        .any(|d| matches!(d, ModelDiagnostic::MultipleNavigationProperties { .. })));
}

#[test]
fn test_explicit_pair_resolves_remaining_ambiguity() {
    let mut builder = ModelBuilder::new();
    builder.entity::<Person>().unwrap();
    let article = builder.entity::<Article>().unwrap();

    let _ = builder
        .has_relationship(article, "Author", Some("AuthoredArticles"))
        .unwrap();
    let model = builder.finish().unwrap();

    let mut pairs: Vec<_> = model
        .foreign_keys()
        .iter()
        .map(|fk| {
            (
                fk.dependent_to_principal.clone().unwrap_or_default(),
                fk.principal_to_dependent.clone().unwrap_or_default(),
            )
        })
        .collect();
    pairs.sort();
    assert_eq!(
        pairs,
        [
            ("Author".to_string(), "AuthoredArticles".to_string()),
            ("Editor".to_string(), "EditedArticles".to_string()),
        ]
    );
}

#[test]
fn test_ignoring_one_navigation_resolves_ambiguity() {
    let mut builder = ModelBuilder::new();
    let person = builder.entity::<Person>().unwrap();
    let article = builder.entity::<Article>().unwrap();

    let _ = builder.ignore(person, "EditedArticles").unwrap();
    let _ = builder.ignore(article, "Editor").unwrap();
    let model = builder.finish().unwrap();

    assert_eq!(model.foreign_keys().len(), 1);
    let fk = &model.foreign_keys()[0];
    assert_eq!(fk.dependent_to_principal.as_deref(), Some("Author"));
    assert_eq!(fk.principal_to_dependent.as_deref(), Some("AuthoredArticles"));
    assert_eq!(fk.properties, ["AuthorId"]);
    assert!(!fk.required);
    assert_eq!(fk.delete_behavior, DeleteBehavior::ClientSetNull);
}

#[test]
fn test_convention_cannot_override_explicit_ignore() {
    let mut builder = ModelBuilder::new();
    let blog = builder.entity::<Blog>().unwrap();
    let _ = builder.ignore(blog, "Posts").unwrap();
    builder.entity::<Post>().unwrap();
    let model = builder.finish().unwrap();

    let fk = &model.foreign_keys()[0];
    assert_eq!(fk.principal_to_dependent, None);
    assert_eq!(fk.dependent_to_principal.as_deref(), Some("Blog"));
}

#[test]
fn test_explicit_ignore_of_type() {
    let mut builder = ModelBuilder::new();
    let _ = builder.ignore_type("Post").unwrap();
    builder.entity::<Blog>().unwrap();
    let model = builder.finish().unwrap();

    assert!(model.find_entity_type("Post").is_none());
    assert!(model.foreign_keys().is_empty());
}

#[test]
fn test_owned_references_split_owner_table() {
    let mut builder = ModelBuilder::new();
    builder.owned::<Address>();
    builder.entity::<Order>().unwrap();
    let model = builder.finish().unwrap();

    let owned: Vec<_> = model
        .entity_types()
        .iter()
        .filter(|et| et.clr_type.as_deref() == Some("Address"))
        .collect();
    assert_eq!(owned.len(), 2);
    assert!(owned.iter().all(|et| et.owned && et.table == "Order"));

    assert!(model.find_column("Order", "Shipping_Street").is_some());
    assert!(model.find_column("Order", "Billing_Street").is_some());
    assert_eq!(
        model.find_column("Order", "Billing_City").map(|p| p.nullable),
        Some(true)
    );
    assert!(model.find_column("Order", "Total").is_none());

    let ownerships: Vec<_> = model.foreign_keys().iter().filter(|fk| fk.ownership).collect();
    assert_eq!(ownerships.len(), 2);
    assert!(ownerships
        .iter()
        .all(|fk| fk.unique && fk.delete_behavior == DeleteBehavior::Cascade));
}

#[test]
fn test_collection_pairs_are_skipped() {
    let mut builder = ModelBuilder::new();
    builder.entity::<Course>().unwrap();
    let model = builder.model();
    assert_eq!(model.foreign_keys().count(), 0);
    assert!(model
        .diagnostics()
        .iter()
        .any(|d| matches!(d, ModelDiagnostic::ManyToManySkipped { .. })));
}

#[test]
fn test_explicit_many_to_many_is_an_error() {
    let mut builder = ModelBuilder::new();
    let course = builder.entity::<Course>().unwrap();
    match builder.has_relationship(course, "Students", Some("Courses")) {
        Err(ModelError::ManyToManyNotSupported { navigation, .. }) => {
            assert_eq!(navigation, "Students");
        }
        other => panic!("Expected ManyToManyNotSupported, got {other:?}"),
    }
}

#[test]
fn test_weaker_source_is_rejected() {
    let mut builder = ModelBuilder::new();
    let blog = builder.entity::<Blog>().unwrap();
    let _ = builder.to_table(blog, "blogs").unwrap();
    let mut model = builder.model().clone();
    let outcome = model
        .set_table_name(blog, "other", ConfigurationSource::Convention)
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::Rejected {
            held: ConfigurationSource::Explicit
        }
    );
}

#[test]
fn test_reference_without_inverse_is_one_unidirectional_relationship() {
    let mut builder = ModelBuilder::new();
    builder.entity::<one_way::Blog>().unwrap();
    builder.entity::<one_way::Post>().unwrap();
    let model = builder.finish().unwrap();

    assert_eq!(model.foreign_keys().len(), 1);
    let fk = &model.foreign_keys()[0];
    assert_eq!(fk.dependent, "Post");
    assert_eq!(fk.principal, "Blog");
    assert_eq!(fk.properties, ["BlogId"]);
    assert_eq!(fk.dependent_to_principal.as_deref(), Some("Blog"));
    assert_eq!(fk.principal_to_dependent, None);
    assert!(!fk.unique);
}

#[test]
fn test_ignoring_one_candidate_leaves_exactly_one_relationship() {
    let mut builder = ModelBuilder::new();
    builder.entity::<competing::Person>().unwrap();
    let doc = builder.entity::<competing::Doc>().unwrap();

    assert_eq!(builder.model().foreign_keys().count(), 0);
    assert_eq!(ambiguous_members(&builder, "Doc"), ["Author", "Editor"]);
    assert_eq!(ambiguous_members(&builder, "Person"), ["Posts"]);

    let _ = builder.ignore(doc, "Editor").unwrap();
    let model = builder.finish().unwrap();

    assert_eq!(
        navigation_pairs(&model),
        [(Some("Author".to_string()), Some("Posts".to_string()))]
    );
}

#[test]
fn test_explicit_one_way_after_discovery_is_not_repaired() {
    let mut builder = ModelBuilder::new();
    let blog = builder.entity::<Blog>().unwrap();
    builder.entity::<Post>().unwrap();
    let _ = builder.has_relationship(blog, "Posts", None).unwrap();
    let model = builder.finish().unwrap();

    assert_eq!(
        navigation_pairs(&model),
        [
            (None, Some("Posts".to_string())),
            (Some("Blog".to_string()), None),
        ]
    );
}

#[test]
fn test_explicit_one_way_before_discovery_is_not_paired() {
    let mut builder = ModelBuilder::new();
    builder
        .batch(|builder| {
            let blog = builder.entity::<Blog>()?;
            let _ = builder.has_relationship(blog, "Posts", None)?;
            builder.entity::<Post>()
        })
        .unwrap();
    let model = builder.finish().unwrap();

    assert_eq!(
        navigation_pairs(&model),
        [
            (None, Some("Posts".to_string())),
            (Some("Blog".to_string()), None),
        ]
    );
}
