mod common;

use bson::doc;
use common::{Fixture, POST, PROJECT, SUB_PROJECT};
use docscope_model::{Rule, Selector, Subject};

#[tokio::test]
async fn no_rules_match_nothing() {
    let fx = Fixture::new();
    assert!(fx.assert_equivalent(PROJECT, &[]).await.is_empty());
}

#[tokio::test]
async fn unconditional_grant_matches_everything() {
    let fx = Fixture::new();
    let found = fx.assert_equivalent(PROJECT, &[Rule::allow_all(PROJECT)]).await;
    assert_eq!(found.len(), fx.count(PROJECT));
}

#[tokio::test]
async fn rules_for_other_subjects_do_not_apply() {
    let fx = Fixture::new();
    let found = fx.assert_equivalent(PROJECT, &[Rule::allow_all(POST)]).await;
    assert!(found.is_empty());
}

#[tokio::test]
async fn allow_alternatives() {
    let fx = Fixture::new();
    let rules = [
        Rule::allow(PROJECT, doc! { "bar": 1 }),
        Rule::allow(PROJECT, doc! { "bar": 2 }),
    ];
    assert_eq!(fx.assert_equivalent(PROJECT, &rules).await.len(), 2);
}

#[tokio::test]
async fn deny_narrows_regardless_of_order() {
    let fx = Fixture::new();
    let allow_then_deny = [Rule::allow_all(PROJECT), Rule::deny(PROJECT, doc! { "bar": 2 })];
    let deny_then_allow = [Rule::deny(PROJECT, doc! { "bar": 2 }), Rule::allow_all(PROJECT)];

    let first = fx.assert_equivalent(PROJECT, &allow_then_deny).await;
    let second = fx.assert_equivalent(PROJECT, &deny_then_allow).await;
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
}

#[tokio::test]
async fn several_denies_each_exclude() {
    let fx = Fixture::new();
    let rules = [
        Rule::allow(PROJECT, doc! { "title": "Sir" }),
        Rule::deny(PROJECT, doc! { "bar": 3 }),
        Rule::deny(PROJECT, doc! { "age": { "$lt": 40 } }),
    ];
    assert_eq!(fx.assert_equivalent(PROJECT, &rules).await.len(), 1);
}

#[tokio::test]
async fn wildcard_subject() {
    let fx = Fixture::new();
    let rules = [
        Rule::allow_all(Subject::All),
        Rule::deny(Subject::All, doc! { "title": "Sir" }),
    ];
    assert_eq!(fx.assert_equivalent(PROJECT, &rules).await.len(), 1);
}

#[tokio::test]
async fn operators() {
    let fx = Fixture::new();
    let cases = [
        (doc! { "numbers": { "$in": ["one"] } }, 1),
        (doc! { "numbers": { "$nin": ["one"] } }, 2),
        (doc! { "numbers": { "$size": 0 } }, 1),
        (doc! { "category_id": { "$exists": false } }, 1),
        (doc! { "age": { "$gt": 45 } }, 2),
        (doc! { "numbers": "three" }, 1),
    ];
    for (conditions, expected) in cases {
        let rules = [Rule::allow(PROJECT, conditions)];
        assert_eq!(fx.assert_equivalent(PROJECT, &rules).await.len(), expected, "{rules:?}");
    }
}

#[tokio::test]
async fn positional_conditions() {
    let fx = Fixture::new();
    let rules = [Rule::allow(PROJECT, doc! { "numbers.0": "one" })];
    assert_eq!(fx.assert_equivalent(PROJECT, &rules).await.len(), 1);

    let second = [Rule::allow(PROJECT, doc! { "numbers.1": { "$exists": true } })];
    assert_eq!(fx.assert_equivalent(PROJECT, &second).await.len(), 1);
}

#[tokio::test]
async fn foreign_key_conditions() {
    let fx = Fixture::new();
    let rules = [Rule::allow(PROJECT, doc! { "category": { "visible": true } })];
    assert_eq!(fx.assert_equivalent(PROJECT, &rules).await.len(), 1);
}

#[tokio::test]
async fn nested_foreign_keys() {
    let fx = Fixture::new();
    let rules = [Rule::allow(
        SUB_PROJECT,
        doc! { "project": { "category": { "visible": true } } },
    )];
    assert_eq!(fx.assert_equivalent(SUB_PROJECT, &rules).await.len(), 1);
}

#[tokio::test]
async fn dotted_foreign_key_conditions() {
    let fx = Fixture::new();
    let dotted = [Rule::allow(POST, doc! { "owner.name": "X" })];
    let nested = [Rule::allow(POST, doc! { "owner": { "name": "X" } })];
    let by_dotted = fx.assert_equivalent(POST, &dotted).await;
    assert_eq!(by_dotted, fx.assert_equivalent(POST, &nested).await);
    assert_eq!(by_dotted.len(), 2);
}

#[tokio::test]
async fn embedded_conditions() {
    let fx = Fixture::new();
    let rules = [Rule::allow(POST, doc! { "tags": { "label": "A" } })];
    assert_eq!(fx.assert_equivalent(POST, &rules).await.len(), 1);
}

#[tokio::test]
async fn single_embedded_document_is_not_a_collection() {
    let fx = Fixture::new();
    fx.store.insert(POST, doc! { "tags": { "label": "A" } });
    let rules = [Rule::allow(POST, doc! { "tags": { "label": "A" } })];
    assert_eq!(fx.assert_equivalent(POST, &rules).await.len(), 1);
}

#[tokio::test]
async fn negated_embedded_conditions() {
    let fx = Fixture::new();
    let rules = [Rule::allow(POST, doc! { "tags": { "$not": { "label": "A" } } })];
    // the B post, the empty collection and the post without tags
    assert_eq!(fx.assert_equivalent(POST, &rules).await.len(), 3);
}

#[tokio::test]
async fn prebuilt_scopes() {
    let fx = Fixture::new();
    let sole = [Rule::allow(PROJECT, Selector::from(doc! { "bar": { "$gte": 2 } }))];
    assert_eq!(fx.assert_equivalent(PROJECT, &sole).await.len(), 2);

    let mixed = [
        Rule::allow(PROJECT, Selector::from(doc! { "bar": { "$gte": 2 } })),
        Rule::deny(PROJECT, doc! { "title": "Lord" }),
    ];
    assert_eq!(fx.assert_equivalent(PROJECT, &mixed).await.len(), 1);
}
