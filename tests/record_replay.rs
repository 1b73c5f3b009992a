//! Integration tests for the record/replay cycle

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use tempfile::TempDir;

use tapedeck::http::{Body, Method, Request, Response, ResponseStatus};
use tapedeck::matching::uri_without_params;
use tapedeck::{
    CassetteOptions, CassetteStack, Config, Configuration, HttpInteraction, MatchAttribute,
    PlaybackSource, RecordMode, RequestHandler, RequestType, Result, TapedeckError,
};

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Create a stack storing cassettes under a temporary directory
fn create_test_stack(temp_dir: &TempDir) -> CassetteStack {
    init_tracing();
    let config = Config {
        cassette_library_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    CassetteStack::new(Configuration::new(config))
}

/// Adapter double: "performs" requests by answering from a closure and
/// counting how often the network was hit
struct FakeAdapter {
    request: Request,
    network_calls: Arc<AtomicUsize>,
}

impl FakeAdapter {
    fn new(request: Request, network_calls: &Arc<AtomicUsize>) -> Self {
        Self {
            request,
            network_calls: Arc::clone(network_calls),
        }
    }

    fn perform(&self) -> Response {
        let n = self.network_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Response::new(ResponseStatus::new(200, "OK"))
            .with_header("Content-Type", "text/plain")
            .with_body(format!("live response {n} for {}", self.request.uri))
    }
}

impl RequestHandler for FakeAdapter {
    type Output = Response;

    fn request(&self) -> &Request {
        &self.request
    }

    fn on_ignored_request(&mut self, _stack: &mut CassetteStack) -> Result<Response> {
        Ok(self.perform())
    }

    fn on_stubbed_by_vcr_request(
        &mut self,
        _stack: &mut CassetteStack,
        response: Response,
    ) -> Result<Response> {
        Ok(response)
    }

    fn on_recordable_request(&mut self, stack: &mut CassetteStack) -> Result<Response> {
        let response = self.perform();
        stack.record_http_interaction(HttpInteraction::new(self.request.clone(), response.clone()));
        Ok(response)
    }
}

fn get(stack: &mut CassetteStack, uri: &str, network_calls: &Arc<AtomicUsize>) -> Result<Response> {
    FakeAdapter::new(Request::new(Method::Get, uri), network_calls).handle(stack)
}

fn body(response: &Response) -> &str {
    response.body.as_str().unwrap()
}

#[test]
fn test_record_then_replay_once() {
    let temp_dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    // Phase 1: record
    {
        let mut stack = create_test_stack(&temp_dir);
        let recorded = stack
            .use_cassette("example", CassetteOptions::new(), |stack| {
                assert!(stack.current_cassette().unwrap().recording());
                get(stack, "http://example.com/", &calls)
            })
            .unwrap();
        assert_eq!(body(&recorded), "live response 1 for http://example.com:80/");
        assert!(temp_dir.path().join("example.yml").exists());
    }

    // Phase 2: replay
    {
        let mut stack = create_test_stack(&temp_dir);
        stack
            .use_cassette("example", CassetteOptions::new(), |stack| {
                let cassette = stack.current_cassette().unwrap();
                assert!(!cassette.recording());
                assert_eq!(cassette.file_path(), Some(temp_dir.path().join("example.yml")));

                let replayed = get(stack, "http://example.com/", &calls)?;
                assert_eq!(body(&replayed), "live response 1 for http://example.com:80/");
                assert_eq!(replayed.headers["Content-Type"], vec!["text/plain"]);

                // Consumed, and real requests are not allowed under `once`
                let error = get(stack, "http://example.com/", &calls).unwrap_err();
                assert!(matches!(error, TapedeckError::UnhandledHttpRequest { .. }));
                Ok(())
            })
            .unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_all_mode_replaces_matching_interactions() {
    let temp_dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut stack = create_test_stack(&temp_dir);

    stack
        .use_cassette("rerecord", CassetteOptions::new(), |stack| {
            get(stack, "http://example.com/foo", &calls)?;
            get(stack, "http://example.com/bar", &calls)?;
            Ok(())
        })
        .unwrap();

    stack
        .use_cassette(
            "rerecord",
            CassetteOptions::new().record(RecordMode::All),
            |stack| {
                let fresh = get(stack, "http://example.com/foo", &calls)?;
                assert_eq!(body(&fresh), "live response 3 for http://example.com:80/foo");
                Ok(())
            },
        )
        .unwrap();

    stack
        .use_cassette(
            "rerecord",
            CassetteOptions::new().record(RecordMode::None),
            |stack| {
                let bar = get(stack, "http://example.com/bar", &calls)?;
                assert_eq!(body(&bar), "live response 2 for http://example.com:80/bar");
                let foo = get(stack, "http://example.com/foo", &calls)?;
                assert_eq!(body(&foo), "live response 3 for http://example.com:80/foo");
                Ok(())
            },
        )
        .unwrap();
}

#[test]
fn test_new_episodes_replays_and_records() {
    let temp_dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut stack = create_test_stack(&temp_dir);
    let options = || CassetteOptions::new().record(RecordMode::NewEpisodes);

    stack
        .use_cassette("episodes", options(), |stack| {
            get(stack, "http://example.com/1", &calls).map(|_| ())
        })
        .unwrap();
    stack
        .use_cassette("episodes", options(), |stack| {
            get(stack, "http://example.com/1", &calls)?;
            get(stack, "http://example.com/2", &calls).map(|_| ())
        })
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    stack
        .use_cassette("episodes", options(), |stack| {
            let cassette = stack.current_cassette().unwrap();
            assert_eq!(cassette.previously_recorded_interactions().len(), 2);
            assert!(cassette.originally_recorded_at().is_some());
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_filter_sensitive_data_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut stack = create_test_stack(&temp_dir);
    stack
        .configuration_mut()
        .filter_sensitive_data("<API_KEY>", None, |_| "s3cr3t".to_string());

    stack
        .use_cassette("filtered", CassetteOptions::new(), |stack| {
            let request = Request::new(Method::Get, "http://example.com/?key=s3cr3t")
                .with_header("Authorization", "Bearer s3cr3t");
            let mut adapter = FakeAdapter::new(request, &calls);
            adapter.handle(stack).map(|_| ())
        })
        .unwrap();

    let on_disk = std::fs::read_to_string(temp_dir.path().join("filtered.yml")).unwrap();
    assert!(!on_disk.contains("s3cr3t"));
    assert!(on_disk.contains("<API_KEY>"));

    stack
        .use_cassette("filtered", CassetteOptions::new(), |stack| {
            let request = Request::new(Method::Get, "http://example.com/?key=s3cr3t");
            let response = FakeAdapter::new(request, &calls).handle(stack)?;
            assert_eq!(
                body(&response),
                "live response 1 for http://example.com:80/?key=s3cr3t"
            );
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_tagged_hooks_only_fire_for_tagged_cassettes() {
    let temp_dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut stack = create_test_stack(&temp_dir);
    stack
        .configuration_mut()
        .before_record(Some("private"), |interaction, _cassette| interaction.ignore());

    stack
        .use_cassette("private", CassetteOptions::new().tag("private"), |stack| {
            get(stack, "http://example.com/", &calls).map(|_| ())
        })
        .unwrap();
    stack
        .use_cassette("public", CassetteOptions::new(), |stack| {
            get(stack, "http://example.com/", &calls).map(|_| ())
        })
        .unwrap();

    assert!(!temp_dir.path().join("private.yml").exists());
    assert!(temp_dir.path().join("public.yml").exists());
}

#[test]
fn test_request_classification_order() {
    let temp_dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut stack = create_test_stack(&temp_dir);
    stack.configuration_mut().ignore_localhost(true);

    let localhost = Request::new(Method::Get, "http://localhost:3000/");
    let remote = Request::new(Method::Get, "http://example.com/");

    assert_eq!(
        tapedeck::request_handler::request_type(&stack, &localhost, false),
        RequestType::Ignored
    );
    assert_eq!(
        tapedeck::request_handler::request_type(&stack, &remote, true),
        RequestType::ExternallyStubbed
    );
    assert_eq!(
        tapedeck::request_handler::request_type(&stack, &remote, false),
        RequestType::Unhandled
    );

    stack
        .use_cassette("classify", CassetteOptions::new(), |stack| {
            assert_eq!(
                tapedeck::request_handler::request_type(stack, &remote, false),
                RequestType::Recordable
            );
            get(stack, "http://example.com/", &calls).map(|_| ())
        })
        .unwrap();

    stack
        .use_cassette("classify", CassetteOptions::new(), |stack| {
            match tapedeck::request_handler::request_type(stack, &remote, true) {
                RequestType::StubbedByVcr(response) => {
                    assert_eq!(body(&response), "live response 1 for http://example.com:80/");
                }
                other => panic!("expected a stub, got {other:?}"),
            }
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_unhandled_error_describes_cassette() {
    let temp_dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut stack = create_test_stack(&temp_dir);

    let error = stack
        .use_cassette(
            "strict",
            CassetteOptions::new().record(RecordMode::None),
            |stack| get(stack, "http://example.com/missing", &calls),
        )
        .unwrap_err();
    let message = error.to_string();
    assert!(message.contains("GET http://example.com:80/missing"));
    assert!(message.contains("strict"));
    assert!(message.contains("none"));
    assert!(message.contains("0 unused"));

    let error = get(&mut stack, "http://example.com/", &calls).unwrap_err();
    assert!(error.to_string().contains("no cassette inserted"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_playback_repeats() {
    let temp_dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut stack = create_test_stack(&temp_dir);

    stack
        .use_cassette("repeat", CassetteOptions::new(), |stack| {
            get(stack, "http://example.com/", &calls).map(|_| ())
        })
        .unwrap();

    stack
        .use_cassette(
            "repeat",
            CassetteOptions::new().allow_playback_repeats(true),
            |stack| {
                for _ in 0..3 {
                    let response = get(stack, "http://example.com/", &calls)?;
                    assert_eq!(body(&response), "live response 1 for http://example.com:80/");
                }
                Ok(())
            },
        )
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_nested_cassettes_read_through() {
    let temp_dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut stack = create_test_stack(&temp_dir);

    stack
        .use_cassette("outer", CassetteOptions::new(), |stack| {
            get(stack, "http://example.com/shared", &calls).map(|_| ())
        })
        .unwrap();

    stack
        .use_cassette("outer", CassetteOptions::new(), |stack| {
            stack.use_cassette(
                "inner",
                CassetteOptions::new().record(RecordMode::None),
                |stack| {
                    let response = get(stack, "http://example.com/shared", &calls)?;
                    assert_eq!(
                        body(&response),
                        "live response 1 for http://example.com:80/shared"
                    );
                    Ok(())
                },
            )
        })
        .unwrap();

    assert!(!temp_dir.path().join("inner.yml").exists());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_custom_matchers() {
    let temp_dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut stack = create_test_stack(&temp_dir);
    let matchers = || -> Vec<MatchAttribute> {
        vec!["method".into(), uri_without_params(["timestamp"]).into()]
    };

    stack
        .use_cassette(
            "params",
            CassetteOptions::new().match_requests_on(matchers()),
            |stack| get(stack, "http://example.com/?q=1&timestamp=100", &calls).map(|_| ()),
        )
        .unwrap();

    stack
        .use_cassette(
            "params",
            CassetteOptions::new().match_requests_on(matchers()),
            |stack| {
                let response = get(stack, "http://example.com/?q=1&timestamp=999", &calls)?;
                assert!(body(&response).starts_with("live response 1"));
                Ok(())
            },
        )
        .unwrap();

    let error = stack
        .use_cassette(
            "params",
            CassetteOptions::new().match_requests_on(["method", "fuzzy"]),
            |_stack| Ok(()),
        )
        .unwrap_err();
    let message = error.to_string();
    assert!(message.contains("fuzzy"));
    assert!(message.contains("body_as_json"));
}

#[test]
fn test_exact_body_bytes_survive_disk() {
    let temp_dir = TempDir::new().unwrap();
    let mut stack = create_test_stack(&temp_dir);
    let payload: Vec<u8> = vec![0, 159, 146, 150, 255, 10];

    stack
        .use_cassette("binary", CassetteOptions::new(), |stack| {
            let request = Request::new(Method::Post, "http://example.com/upload")
                .with_body(Body::new(payload.clone()));
            let response = Response::new(ResponseStatus::new(201, "Created"))
                .with_body(Body::new(payload.clone()));
            stack.record_http_interaction(HttpInteraction::new(request, response));
            Ok(())
        })
        .unwrap();

    stack
        .use_cassette("binary", CassetteOptions::new(), |stack| {
            let request = Request::new(Method::Post, "http://example.com/upload");
            let response = stack
                .current_cassette()
                .unwrap()
                .http_interactions()
                .response_for(&request)
                .unwrap();
            assert_eq!(response.body.as_bytes(), payload.as_slice());
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_json_serializer_and_nested_names() {
    let temp_dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut stack = create_test_stack(&temp_dir);

    stack
        .use_cassette(
            "api/users: list",
            CassetteOptions::new().serializer("json"),
            |stack| get(stack, "https://api.example.com/users", &calls).map(|_| ()),
        )
        .unwrap();

    let path = temp_dir.path().join("api/users_list.json");
    let document: serde_json::Value =
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
    assert_eq!(
        document["http_interactions"][0]["request"]["uri"],
        "https://api.example.com:443/users"
    );
    assert!(document["recorded_with"].as_str().unwrap().starts_with("tapedeck"));
}

#[test]
fn test_legacy_cassette_rejected() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("legacy.yml"),
        "- request:\n    method: get\n    uri: http://example.com/\n",
    )
    .unwrap();
    let mut stack = create_test_stack(&temp_dir);

    let error = stack
        .insert_cassette("legacy", CassetteOptions::new())
        .unwrap_err();
    assert!(matches!(error, TapedeckError::InvalidCassetteFormat(_)));
    assert!(stack.current_cassette().is_none());
}

#[test]
fn test_turned_off_requests_pass_through() {
    let temp_dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut stack = create_test_stack(&temp_dir);

    let response = stack
        .turned_off(false, |stack| get(stack, "http://example.com/", &calls))
        .unwrap()
        .unwrap();
    assert!(body(&response).starts_with("live response 1"));
    assert!(stack.turned_on());
}
