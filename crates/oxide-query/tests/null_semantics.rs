//! Two-valued null semantics over a frozen model.

#![allow(dead_code)]

use oxide_model::{FrozenModel, ModelBuilder};
use oxide_model_derive::Reflect;
use oxide_query::prelude::*;

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

fn model() -> FrozenModel {
    let mut builder = ModelBuilder::new();
    builder.entity::<Blog>().unwrap();
    builder.entity::<Post>().unwrap();
    builder.finish().unwrap()
}

fn blogs_where(model: &FrozenModel, predicate: Expr) -> String {
    Query::from_table("Blog")
        .filter(predicate)
        .to_sql(model)
        .unwrap()
}

#[test]
fn test_nullable_parameter_matches_null_column() {
    let model = model();
    let sql = blogs_where(&model, Expr::column("Url").eq(Expr::nullable_parameter("url")));
    assert_eq!(
        sql,
        "SELECT * FROM \"Blog\" WHERE \"Url\" = :url OR (\"Url\" IS NULL AND :url IS NULL)"
    );
}

#[test]
fn test_not_equal_keeps_null_rows() {
    let model = model();
    let expected = "SELECT * FROM \"Blog\" WHERE \"Url\" <> 'x' OR \"Url\" IS NULL";
    assert_eq!(
        blogs_where(&model, Expr::column("Url").not_eq(Expr::string("x"))),
        expected
    );
    assert_eq!(
        blogs_where(&model, Expr::column("Url").eq(Expr::string("x")).not()),
        expected
    );
}

#[test]
fn test_not_equal_between_nullable_operands() {
    let model = model();
    let sql = blogs_where(
        &model,
        Expr::column("Url").not_eq(Expr::nullable_parameter("url")),
    );
    assert_eq!(
        sql,
        "SELECT * FROM \"Blog\" WHERE (\"Url\" <> :url OR \"Url\" IS NULL OR :url IS NULL) \
         AND (\"Url\" IS NOT NULL OR :url IS NOT NULL)"
    );
}

#[test]
fn test_not_is_pushed_through_and() {
    let model = model();
    let predicate = Expr::column("Id")
        .gt(Expr::integer(5))
        .and(Expr::column("Url").eq(Expr::string("x")))
        .not();
    assert_eq!(
        blogs_where(&model, predicate),
        "SELECT * FROM \"Blog\" WHERE \"Id\" <= 5 OR (\"Url\" <> 'x' OR \"Url\" IS NULL)"
    );
}

#[test]
fn test_negated_ordering_includes_nulls() {
    let model = model();
    let predicate = Expr::column("Url").gt(Expr::string("m")).not();
    assert_eq!(
        blogs_where(&model, predicate),
        "SELECT * FROM \"Blog\" WHERE \"Url\" <= 'm' OR \"Url\" IS NULL"
    );
    assert_eq!(
        blogs_where(&model, Expr::column("Url").gt(Expr::string("m"))),
        "SELECT * FROM \"Blog\" WHERE \"Url\" > 'm'"
    );
}

#[test]
fn test_in_list_with_null_item() {
    let model = model();
    let list = vec![Expr::string("a"), Expr::null()];
    assert_eq!(
        blogs_where(&model, Expr::column("Url").in_list(list.clone())),
        "SELECT * FROM \"Blog\" WHERE \"Url\" IN ('a') OR \"Url\" IS NULL"
    );
    assert_eq!(
        blogs_where(&model, Expr::column("Url").not_in_list(list)),
        "SELECT * FROM \"Blog\" WHERE \"Url\" NOT IN ('a') AND \"Url\" IS NOT NULL"
    );
    assert_eq!(
        blogs_where(&model, Expr::column("Id").in_list(vec![Expr::null()])),
        "SELECT * FROM \"Blog\" WHERE FALSE"
    );
}

#[test]
fn test_null_test_of_required_column_folds() {
    let model = model();
    assert_eq!(
        blogs_where(&model, Expr::column("Id").is_null()),
        "SELECT * FROM \"Blog\" WHERE FALSE"
    );
    assert_eq!(
        blogs_where(&model, Expr::column("Url").is_null().not()),
        "SELECT * FROM \"Blog\" WHERE \"Url\" IS NOT NULL"
    );
}

#[test]
fn test_relational_query_is_rendered_as_written() {
    let model = model();
    let sql = Query::from_table("Blog")
        .filter(Expr::column("Url").eq(Expr::null()))
        .relational_nulls()
        .to_sql(&model)
        .unwrap();
    assert_eq!(sql, "SELECT * FROM \"Blog\" WHERE \"Url\" = NULL");
}

#[test]
fn test_value_context_is_never_unknown() {
    let model = model();
    let rewriter = NullSemanticsRewriter::new(NullSemantics::TwoValued, &model).with_table("Blog");
    let renderer = SqlRenderer::new();

    let value = rewriter
        .rewrite_value(&Expr::column("Url").eq(Expr::string("x")))
        .unwrap();
    assert_eq!(
        renderer.render(&value).unwrap(),
        "\"Url\" = 'x' AND \"Url\" IS NOT NULL"
    );

    let case = Expr::case(
        vec![(Expr::column("Url").eq(Expr::string("x")), Expr::integer(1))],
        Some(Expr::integer(0)),
    );
    assert_eq!(
        renderer.render(&rewriter.rewrite_value(&case).unwrap()).unwrap(),
        "CASE WHEN \"Url\" = 'x' THEN 1 ELSE 0 END"
    );
}

#[test]
fn test_qualified_columns_use_their_own_table() {
    let model = model();
    let sql = blogs_where(
        &model,
        Expr::qualified_column("Post", "Title").eq(Expr::column("Url")),
    );
    assert_eq!(
        sql,
        "SELECT * FROM \"Blog\" WHERE \"Post\".\"Title\" = \"Url\""
    );
}

#[test]
fn test_bracket_quoted_rendering() {
    let model = model();
    let sql = Query::from_table("Blog")
        .columns(&["Id", "Url"])
        .filter(Expr::column("Url").not_eq(Expr::string("x")))
        .to_sql_with(&model, &SqlRenderer::with_quotes('[', ']'))
        .unwrap();
    assert_eq!(
        sql,
        "SELECT [Id], [Url] FROM [Blog] WHERE [Url] <> 'x' OR [Url] IS NULL"
    );
}

#[test]
fn test_strict_rewriter_reports_unmapped_column() {
    let model = model();
    let rewriter = NullSemanticsRewriter::new(NullSemantics::TwoValued, &model)
        .with_table("Blog")
        .strict();
    match rewriter.rewrite_predicate(&Expr::column("Rating").gt(Expr::integer(3))) {
        Err(QueryError::UnknownColumn { table, column }) => {
            assert_eq!(table.as_deref(), Some("Blog"));
            assert_eq!(column, "Rating");
        }
        other => panic!("Expected UnknownColumn, got {other:?}"),
    }
}
