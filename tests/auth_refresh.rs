// std
use std::{
	sync::{
		Arc, Mutex, OnceLock,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use http::header::AUTHORIZATION;
// self
use rest_transport::{
	auth::{AuthTransport, RefreshMetrics},
	config::TransportConfig,
	error::Error,
	http::{HttpClient, HttpFuture, HttpRequest, HttpResponse},
	request::Request,
	store::{
		ACCESS_TOKEN_KEY, MemoryStore, REFRESH_TOKEN_KEY, SecretStore, StoreError, StoreFuture,
	},
	transport::{HttpTransport, Transport},
	url::Url,
};

const REFRESH_PATH: &str = "/auth/refresh";

/// Fake API that only accepts `Bearer fresh` and serves the refresh endpoint from a script.
struct Backend {
	refresh_reply: (u16, &'static str),
	refresh_delay: Duration,
	reject_all: AtomicBool,
	api_calls: AtomicUsize,
	refresh_calls: AtomicUsize,
	refresh_bodies: Mutex<Vec<String>>,
	// Refresh responses are held until this many callers have joined the exchange.
	join_gate: OnceLock<(Arc<RefreshMetrics>, u64)>,
}
impl Backend {
	fn new(refresh_reply: (u16, &'static str)) -> Arc<Self> {
		Self::with_refresh_delay(refresh_reply, Duration::ZERO)
	}

	fn with_refresh_delay(refresh_reply: (u16, &'static str), refresh_delay: Duration) -> Arc<Self> {
		Arc::new(Self {
			refresh_reply,
			refresh_delay,
			reject_all: AtomicBool::new(false),
			api_calls: AtomicUsize::new(0),
			refresh_calls: AtomicUsize::new(0),
			refresh_bodies: Mutex::default(),
			join_gate: OnceLock::new(),
		})
	}

	fn api_calls(&self) -> usize {
		self.api_calls.load(Ordering::SeqCst)
	}

	fn refresh_calls(&self) -> usize {
		self.refresh_calls.load(Ordering::SeqCst)
	}

	async fn wait_for_joins(&self) {
		let Some((metrics, joins)) = self.join_gate.get() else { return };

		while metrics.joins() < *joins {
			tokio::time::sleep(Duration::from_millis(1)).await;
		}
	}
}
impl HttpClient for Backend {
	fn call(&self, request: HttpRequest) -> HttpFuture<'_> {
		Box::pin(async move {
			if request.uri().path() == REFRESH_PATH {
				self.refresh_calls.fetch_add(1, Ordering::SeqCst);
				self.refresh_bodies
					.lock()
					.expect("Refresh log lock should not be poisoned.")
					.push(String::from_utf8_lossy(request.body()).into_owned());
				self.wait_for_joins().await;

				if !self.refresh_delay.is_zero() {
					tokio::time::sleep(self.refresh_delay).await;
				}

				let (status, body) = self.refresh_reply;

				return Ok(reply(status, body));
			}

			self.api_calls.fetch_add(1, Ordering::SeqCst);

			let authorized =
				request.headers().get(AUTHORIZATION).is_some_and(|value| value == "Bearer fresh");

			if authorized && !self.reject_all.load(Ordering::SeqCst) {
				Ok(reply(200, "{\"id\":\"me\"}"))
			} else {
				Ok(reply(401, "{\"message\":\"token expired\"}"))
			}
		})
	}
}

/// Memory store that refuses to delete the access token.
struct StickyAccessToken(MemoryStore);
impl SecretStore for StickyAccessToken {
	fn save<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
		self.0.save(key, value)
	}

	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		self.0.get(key)
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		if key == ACCESS_TOKEN_KEY {
			Box::pin(async { Err(StoreError::Backend { message: "keychain locked".into() }) })
		} else {
			self.0.delete(key)
		}
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		self.0.clear()
	}
}

fn reply(status: u16, body: &str) -> HttpResponse {
	let mut response = HttpResponse::new(body.as_bytes().to_vec());

	*response.status_mut() =
		http::StatusCode::from_u16(status).expect("Scripted status should be valid.");

	response
}

async fn fixture(
	backend: &Arc<Backend>,
	tokens: &[(&str, &str)],
) -> (AuthTransport<HttpTransport<Backend>>, Arc<MemoryStore>) {
	let store = Arc::new(MemoryStore::default());

	for (key, value) in tokens {
		store.save(key, value).await.expect("Seeding the store should succeed.");
	}

	let transport = HttpTransport::with_http_client(config(), store.clone(), backend.clone());

	(AuthTransport::over_http(transport), store)
}

fn config() -> TransportConfig {
	let base_url = Url::parse("https://api.example.com").expect("Fixture URL should parse.");

	TransportConfig::builder(base_url)
		.refresh_path(REFRESH_PATH)
		.build()
		.expect("Fixture configuration should be valid.")
}

fn stored(store: &MemoryStore, key: &str) -> Option<String> {
	store.snapshot().get(key).cloned()
}

#[tokio::test]
async fn unauthorized_call_refreshes_and_replays_once() {
	let backend = Backend::new((200, "{\"access_token\":\"fresh\"}"));
	let (auth, store) =
		fixture(&backend, &[(ACCESS_TOKEN_KEY, "stale"), (REFRESH_TOKEN_KEY, "refresh-1")]).await;
	let response =
		auth.execute(&Request::get("/me")).await.expect("Replay after refresh should succeed.");

	assert_eq!(response.body(), b"{\"id\":\"me\"}");
	assert_eq!(backend.api_calls(), 2);
	assert_eq!(backend.refresh_calls(), 1);
	assert_eq!(
		*backend.refresh_bodies.lock().expect("Refresh log lock should not be poisoned."),
		["{\"refresh_token\":\"refresh-1\"}"]
	);
	assert_eq!(stored(&store, ACCESS_TOKEN_KEY).as_deref(), Some("fresh"));
	assert_eq!(stored(&store, REFRESH_TOKEN_KEY).as_deref(), Some("refresh-1"));

	let metrics = auth.refresh_metrics();

	assert_eq!((metrics.attempts(), metrics.successes(), metrics.failures()), (1, 1, 0));
	assert!(!auth.refresher().is_refreshing().await);
}

#[tokio::test]
async fn rotated_refresh_token_is_persisted() {
	let backend =
		Backend::new((200, "{\"access_token\":\"fresh\",\"refresh_token\":\"refresh-2\"}"));
	let (auth, store) =
		fixture(&backend, &[(ACCESS_TOKEN_KEY, "stale"), (REFRESH_TOKEN_KEY, "refresh-1")]).await;

	auth.execute_void(&Request::put("/me")).await.expect("Replay after refresh should succeed.");

	assert_eq!(stored(&store, ACCESS_TOKEN_KEY).as_deref(), Some("fresh"));
	assert_eq!(stored(&store, REFRESH_TOKEN_KEY).as_deref(), Some("refresh-2"));
}

#[tokio::test]
async fn failed_refresh_clears_both_tokens() {
	let backend = Backend::new((400, "{\"error\":\"invalid_grant\"}"));
	let (auth, store) =
		fixture(&backend, &[(ACCESS_TOKEN_KEY, "stale"), (REFRESH_TOKEN_KEY, "refresh-1")]).await;
	let err = auth
		.execute(&Request::get("/me"))
		.await
		.expect_err("A rejected refresh should surface as unauthorized.");

	assert_eq!(err, Error::Unauthorized);
	assert_eq!(backend.api_calls(), 1);
	assert_eq!(backend.refresh_calls(), 1);
	assert!(store.snapshot().is_empty());
	assert_eq!(auth.refresh_metrics().failures(), 1);
}

#[tokio::test]
async fn refresh_rejected_with_401_does_not_recurse() {
	let backend = Backend::new((401, "{\"message\":\"refresh token revoked\"}"));
	let (auth, store) =
		fixture(&backend, &[(ACCESS_TOKEN_KEY, "stale"), (REFRESH_TOKEN_KEY, "refresh-1")]).await;
	let err = auth
		.execute(&Request::get("/me"))
		.await
		.expect_err("A revoked refresh token should surface as unauthorized.");

	assert_eq!(err, Error::Unauthorized);
	assert_eq!(backend.refresh_calls(), 1);
	assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn undecodable_refresh_response_counts_as_failure() {
	let backend = Backend::new((200, "{\"token\":\"fresh\"}"));
	let (auth, store) =
		fixture(&backend, &[(ACCESS_TOKEN_KEY, "stale"), (REFRESH_TOKEN_KEY, "refresh-1")]).await;
	let err = auth
		.execute(&Request::get("/me"))
		.await
		.expect_err("A response without access_token should fail the refresh.");

	assert_eq!(err, Error::Unauthorized);
	assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn missing_refresh_token_fails_without_network_call() {
	let backend = Backend::new((200, "{\"access_token\":\"fresh\"}"));
	let (auth, store) = fixture(&backend, &[(ACCESS_TOKEN_KEY, "stale")]).await;
	let err = auth
		.execute(&Request::get("/me"))
		.await
		.expect_err("Without a refresh token the call should stay unauthorized.");

	assert_eq!(err, Error::Unauthorized);
	assert_eq!(backend.refresh_calls(), 0);
	assert_eq!(auth.refresh_metrics().attempts(), 0);
	assert_eq!(stored(&store, ACCESS_TOKEN_KEY).as_deref(), Some("stale"));
}

#[tokio::test]
async fn replay_is_attempted_only_once() {
	let backend = Backend::new((200, "{\"access_token\":\"fresh\"}"));

	backend.reject_all.store(true, Ordering::SeqCst);

	let (auth, store) =
		fixture(&backend, &[(ACCESS_TOKEN_KEY, "stale"), (REFRESH_TOKEN_KEY, "refresh-1")]).await;
	let err = auth
		.execute(&Request::get("/me"))
		.await
		.expect_err("A replay rejected again should surface as unauthorized.");

	assert_eq!(err, Error::Unauthorized);
	assert_eq!(backend.api_calls(), 2);
	assert_eq!(backend.refresh_calls(), 1);
	assert_eq!(stored(&store, ACCESS_TOKEN_KEY).as_deref(), Some("fresh"));
}

#[tokio::test]
async fn authorized_calls_skip_refresh() {
	let backend = Backend::new((200, "{\"access_token\":\"fresh\"}"));
	let (auth, _) =
		fixture(&backend, &[(ACCESS_TOKEN_KEY, "fresh"), (REFRESH_TOKEN_KEY, "refresh-1")]).await;
	let response = auth.execute(&Request::get("/me")).await.expect("Fresh token should work.");

	assert_eq!(response.status(), 200);
	assert_eq!(backend.api_calls(), 1);
	assert_eq!(backend.refresh_calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_unauthorized_calls_share_one_refresh() {
	const CALLERS: usize = 5;

	let backend = Backend::new((200, "{\"access_token\":\"fresh\"}"));
	let (auth, store) =
		fixture(&backend, &[(ACCESS_TOKEN_KEY, "stale"), (REFRESH_TOKEN_KEY, "refresh-1")]).await;

	backend
		.join_gate
		.set((auth.refresh_metrics().clone(), CALLERS as u64 - 1))
		.unwrap_or_else(|_| panic!("Join gate should only be set once."));

	let auth = Arc::new(auth);
	let handles = (0..CALLERS)
		.map(|_| {
			let auth = auth.clone();

			tokio::spawn(async move { auth.execute(&Request::get("/me")).await })
		})
		.collect::<Vec<_>>();

	for handle in handles {
		handle
			.await
			.expect("Caller task should not panic.")
			.expect("Every caller should succeed after the shared refresh.");
	}

	assert_eq!(backend.refresh_calls(), 1);
	assert_eq!(backend.api_calls(), CALLERS * 2);
	assert_eq!(stored(&store, ACCESS_TOKEN_KEY).as_deref(), Some("fresh"));

	let metrics = auth.refresh_metrics();

	assert_eq!((metrics.attempts(), metrics.joins()), (1, CALLERS as u64 - 1));
}

#[tokio::test]
async fn settled_refresh_allows_a_new_exchange() {
	let backend = Backend::new((200, "{\"access_token\":\"fresh\"}"));
	let (auth, store) =
		fixture(&backend, &[(ACCESS_TOKEN_KEY, "stale"), (REFRESH_TOKEN_KEY, "refresh-1")]).await;

	auth.execute(&Request::get("/me")).await.expect("First refresh should succeed.");
	store.save(ACCESS_TOKEN_KEY, "stale").await.expect("Resetting the token should succeed.");
	auth.execute(&Request::get("/me")).await.expect("Second refresh should succeed.");

	assert_eq!(backend.refresh_calls(), 2);
	assert_eq!(auth.refresh_metrics().joins(), 0);
}

#[tokio::test]
async fn sessions_are_established_and_ended() {
	let backend = Backend::new((200, "{\"access_token\":\"fresh\"}"));
	let (auth, store) = fixture(&backend, &[]).await;

	auth.establish_session("fresh", "refresh-1").await.expect("Saving the session should succeed.");

	assert_eq!(stored(&store, ACCESS_TOKEN_KEY).as_deref(), Some("fresh"));
	assert_eq!(stored(&store, REFRESH_TOKEN_KEY).as_deref(), Some("refresh-1"));

	auth.execute(&Request::get("/me")).await.expect("Established session should authorize.");
	auth.end_session().await.expect("Ending the session should succeed.");

	assert!(store.snapshot().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_all_see_a_failed_refresh() {
	const CALLERS: usize = 5;

	let backend = Backend::new((400, "{\"error\":\"invalid_grant\"}"));
	let (auth, store) =
		fixture(&backend, &[(ACCESS_TOKEN_KEY, "stale"), (REFRESH_TOKEN_KEY, "refresh-1")]).await;

	backend
		.join_gate
		.set((auth.refresh_metrics().clone(), CALLERS as u64 - 1))
		.unwrap_or_else(|_| panic!("Join gate should only be set once."));

	let auth = Arc::new(auth);
	let handles = (0..CALLERS)
		.map(|_| {
			let auth = auth.clone();

			tokio::spawn(async move { auth.execute(&Request::get("/me")).await })
		})
		.collect::<Vec<_>>();

	for handle in handles {
		let err = handle
			.await
			.expect("Caller task should not panic.")
			.expect_err("Every caller should observe the failed refresh.");

		assert_eq!(err, Error::Unauthorized);
	}

	assert_eq!(backend.refresh_calls(), 1);
	assert_eq!(backend.api_calls(), CALLERS);
	assert!(store.snapshot().is_empty());
	assert_eq!(auth.refresh_metrics().failures(), 1);
}

#[tokio::test(start_paused = true)]
async fn refresh_settles_after_its_caller_is_cancelled() {
	let backend = Backend::with_refresh_delay(
		(200, "{\"access_token\":\"fresh\"}"),
		Duration::from_secs(1),
	);
	let (auth, store) =
		fixture(&backend, &[(ACCESS_TOKEN_KEY, "stale"), (REFRESH_TOKEN_KEY, "refresh-1")]).await;
	let outcome =
		tokio::time::timeout(Duration::from_millis(100), auth.execute(&Request::get("/me"))).await;

	assert!(outcome.is_err(), "The caller should give up while the refresh is running.");

	tokio::time::sleep(Duration::from_secs(600)).await;

	assert!(!auth.refresher().is_refreshing().await);
	assert_eq!(stored(&store, ACCESS_TOKEN_KEY).as_deref(), Some("fresh"));
	assert_eq!(backend.refresh_calls(), 1);
	assert_eq!(auth.refresh_metrics().successes(), 1);

	auth.execute(&Request::get("/me")).await.expect("Next call should use the refreshed token.");

	assert_eq!(backend.refresh_calls(), 1);
}

#[tokio::test]
async fn failed_deletes_do_not_stop_clearing_the_other_token() {
	let backend = Backend::new((400, "{\"error\":\"invalid_grant\"}"));
	let store = Arc::new(StickyAccessToken(MemoryStore::default()));

	store.save(ACCESS_TOKEN_KEY, "stale").await.expect("Seeding the store should succeed.");
	store.save(REFRESH_TOKEN_KEY, "refresh-1").await.expect("Seeding the store should succeed.");

	let transport: HttpTransport<Backend> = HttpTransport::with_http_client(config(), store.clone(), backend.clone());
	let auth = AuthTransport::over_http(transport);
	let err = auth
		.execute(&Request::get("/me"))
		.await
		.expect_err("A rejected refresh should surface as unauthorized.");

	assert_eq!(err, Error::Unauthorized);
	assert_eq!(stored(&store.0, ACCESS_TOKEN_KEY).as_deref(), Some("stale"));
	assert_eq!(stored(&store.0, REFRESH_TOKEN_KEY), None);
	assert_eq!(auth.refresh_metrics().failures(), 1);
	assert!(!auth.refresher().is_refreshing().await);
}
