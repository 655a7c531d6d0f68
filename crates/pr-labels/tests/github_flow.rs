//! End-to-end runs of both checks through the real GitHub client against a
//! mock API.

use pr_labels::porting::{BACKPORT_LABELS, FORWARD_PORT_LABELS, IGNORE_LABELS};
use pr_labels::{
    label_pull_request, validate_pull_request, BuiltinDiffstat, ExclusionSet, PortingError,
    PortingVerdict, PortingViolation, SizeError, SizeRanges,
};
use scm::{GitHubClient, RepoSlug};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn repo() -> RepoSlug {
    "acme/widgets".parse().unwrap()
}

fn client(server: &MockServer) -> GitHubClient {
    GitHubClient::with_base_url("test-token", server.uri()).unwrap()
}

fn labels(names: &[&str]) -> serde_json::Value {
    json!(names.iter().map(|n| json!({ "name": n })).collect::<Vec<_>>())
}

/// A diff touching `src/lib.rs` with `added` new lines and one removed line,
/// plus a lock file change that must not count.
fn diff_with(added: usize) -> String {
    let mut diff = String::from(
        "diff --git a/src/lib.rs b/src/lib.rs\n\
         index 1111111..2222222 100644\n\
         --- a/src/lib.rs\n\
         +++ b/src/lib.rs\n",
    );
    diff.push_str(&format!("@@ -1,3 +1,{} @@\n", added + 2));
    diff.push_str(" pub fn run() {\n");
    diff.push_str("-    old();\n");
    for i in 0..added {
        diff.push_str(&format!("+    step_{i}();\n"));
    }
    diff.push_str(" }\n");
    diff.push_str(
        "diff --git a/Cargo.lock b/Cargo.lock\n\
         index 3333333..4444444 100644\n\
         --- a/Cargo.lock\n\
         +++ b/Cargo.lock\n\
         @@ -1,1 +1,4 @@\n \
         [[package]]\n\
         +name = \"a\"\n\
         +name = \"b\"\n\
         +name = \"c\"\n",
    );
    diff
}

async fn mount_pr(server: &MockServer, pr: u64, diff: String, current: &[&str]) {
    Mock::given(method("GET"))
        .and(path(format!("/repos/acme/widgets/pulls/{pr}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(diff))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/repos/acme/widgets/issues/{pr}/labels")))
        .respond_with(ResponseTemplate::new(200).set_body_json(labels(current)))
        .mount(server)
        .await;
}

async fn mount_repository_labels(server: &MockServer, extra: &[&str]) {
    let mut all: Vec<&str> = BACKPORT_LABELS
        .iter()
        .chain(FORWARD_PORT_LABELS.iter())
        .chain(IGNORE_LABELS.iter())
        .copied()
        .collect();
    all.extend_from_slice(extra);
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/labels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(labels(&all)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn size_label_replaces_stale_size_label() {
    let server = MockServer::start().await;
    mount_pr(&server, 12, diff_with(20), &["bug", "size/huge"]).await;

    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/issues/12/labels"))
        .and(body_json(json!({ "labels": ["size/small"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(labels(&["size/small"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/repos/acme/widgets/issues/12/labels/size%2Fhuge"))
        .respond_with(ResponseTemplate::new(200).set_body_json(labels(&[])))
        .expect(1)
        .mount(&server)
        .await;

    let report = label_pull_request(
        &client(&server),
        &repo(),
        12,
        &SizeRanges::defaults(),
        &BuiltinDiffstat,
        &ExclusionSet::with_defaults(Vec::<String>::new()).unwrap(),
        false,
    )
    .await
    .unwrap();

    assert_eq!(report.size, 21);
    assert_eq!(report.stats.files_changed, 1);
    assert_eq!(report.outcome.label.as_str(), "size/small");
    assert!(report.outcome.applied);
    assert_eq!(report.outcome.plan.remove, vec!["size/huge".to_string()]);
}

#[tokio::test]
async fn dry_run_makes_no_writes() {
    let server = MockServer::start().await;
    mount_pr(&server, 3, diff_with(2), &["size/medium"]).await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let report = label_pull_request(
        &client(&server),
        &repo(),
        3,
        &SizeRanges::defaults(),
        &BuiltinDiffstat,
        &ExclusionSet::with_defaults(Vec::<String>::new()).unwrap(),
        true,
    )
    .await
    .unwrap();

    assert_eq!(report.size, 3);
    assert_eq!(report.outcome.label.as_str(), "size/tiny");
    assert!(!report.outcome.applied);
    assert_eq!(report.outcome.plan.add.as_deref(), Some("size/tiny"));
}

#[tokio::test]
async fn api_failure_is_reported_as_remote_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/pulls/9"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })),
        )
        .mount(&server)
        .await;

    let err = label_pull_request(
        &client(&server),
        &repo(),
        9,
        &SizeRanges::defaults(),
        &BuiltinDiffstat,
        &ExclusionSet::none(),
        true,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, SizeError::Remote { .. }), "got {err:?}");
}

#[tokio::test]
async fn porting_check_passes_with_one_label_per_group() {
    let server = MockServer::start().await;
    mount_repository_labels(&server, &["bug"]).await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/issues/5/labels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(labels(&[
            "bug",
            "no-backport-needed",
            "needs-forward-port",
        ])))
        .mount(&server)
        .await;

    let verdict = validate_pull_request(&client(&server), &repo(), 5)
        .await
        .unwrap();
    assert_eq!(
        verdict,
        PortingVerdict::Resolved {
            backport: Some("no-backport-needed".to_string()),
            forward_port: Some("needs-forward-port".to_string()),
        }
    );
}

#[tokio::test]
async fn porting_check_fails_on_unlabelled_pr() {
    let server = MockServer::start().await;
    mount_repository_labels(&server, &[]).await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/issues/6/labels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(labels(&[])))
        .mount(&server)
        .await;

    let err = validate_pull_request(&client(&server), &repo(), 6)
        .await
        .unwrap_err();
    assert!(
        matches!(err, PortingError::Violation(PortingViolation::NoLabels { pr: 6 })),
        "got {err:?}"
    );
}

#[tokio::test]
async fn porting_check_requires_repository_labels() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/labels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(labels(&["bug", "backport"])))
        .mount(&server)
        .await;

    let err = validate_pull_request(&client(&server), &repo(), 6)
        .await
        .unwrap_err();
    match err {
        PortingError::MissingRepositoryLabels { missing, .. } => {
            assert!(missing.contains(&"needs-backport".to_string()));
            assert!(!missing.contains(&"backport".to_string()));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
