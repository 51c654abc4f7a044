use anyhow::{ensure, Context, Result};
use chrono::Utc;
use lifeprogress::session::{
    AuthError, AuthStore, BrowserEnvironment, FetchScript, Identity, IdentityProvider,
    LoginAction, MemoryIdentityProvider, MemoryProfileStore, Profile, RecordingNavigator,
    RouteGuard, RouteTable, SignInOutcome, StatusKind,
};
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;

type Guard = RouteGuard<MemoryIdentityProvider, MemoryProfileStore, RecordingNavigator>;

struct Harness {
    provider: Arc<MemoryIdentityProvider>,
    profiles: Arc<MemoryProfileStore>,
    navigator: Arc<RecordingNavigator>,
    store: AuthStore,
    guard: Guard,
}

impl Harness {
    fn new(profiles: MemoryProfileStore) -> Self {
        Self::with_navigator(profiles, RecordingNavigator::new())
    }

    fn with_navigator(profiles: MemoryProfileStore, navigator: RecordingNavigator) -> Self {
        let provider = Arc::new(MemoryIdentityProvider::new());
        let profiles = Arc::new(profiles);
        let navigator = Arc::new(navigator);
        let (store, writer) = AuthStore::new();
        let guard = RouteGuard::new(
            provider.clone(),
            profiles.clone(),
            navigator.clone(),
            RouteTable::default(),
            writer,
        );
        Self {
            provider,
            profiles,
            navigator,
            store,
            guard,
        }
    }

    fn status(&self) -> StatusKind {
        self.store.snapshot().status.kind()
    }

    fn uid(&self) -> Option<String> {
        self.store
            .snapshot()
            .status
            .identity()
            .map(|identity| identity.uid.clone())
    }
}

fn stored(uid: &str) -> Profile {
    Profile::for_new_identity(&Identity::new(uid), Utc::now())
}

async fn settle() {
    sleep(Duration::from_millis(500)).await;
}

#[tokio::test(start_paused = true)]
async fn fresh_load_without_session_goes_to_login() -> Result<()> {
    let harness = Harness::new(MemoryProfileStore::new());
    let _mount = harness.guard.mount("/dashboard");

    harness.provider.emit(None);
    settle().await;

    ensure!(harness.navigator.issued() == ["/login"], "navigations: {:?}", harness.navigator.issued());
    ensure!(harness.profiles.fetch_count() == 0, "no profile fetch expected");
    ensure!(harness.status() == StatusKind::Unauthenticated);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn prior_session_on_login_goes_to_dashboard() -> Result<()> {
    let harness = Harness::new(MemoryProfileStore::new().with_profile(stored("u1")));
    let _mount = harness.guard.mount("/login");

    harness.provider.emit(Some(Identity::new("u1")));
    settle().await;

    ensure!(harness.navigator.issued() == ["/dashboard"], "navigations: {:?}", harness.navigator.issued());
    ensure!(harness.profiles.fetch_count() == 1);
    ensure!(harness.status() == StatusKind::Authenticated);
    ensure!(harness.uid().as_deref() == Some("u1"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn redirect_return_and_observer_report_count_once() -> Result<()> {
    let harness = Harness::new(MemoryProfileStore::new().with_profile(stored("u1")));
    harness.provider.set_redirect_result(Ok(Identity::new("u1")));
    let _mount = harness.guard.mount("/login");

    sleep(Duration::from_millis(50)).await;
    harness.provider.emit(Some(Identity::new("u1")));
    settle().await;

    ensure!(harness.profiles.fetch_count() == 1, "fetches: {}", harness.profiles.fetch_count());
    ensure!(harness.navigator.issued() == ["/dashboard"], "navigations: {:?}", harness.navigator.issued());
    ensure!(harness.guard.redirect_consumed());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn observer_report_during_slow_redirect_load_is_deduplicated() -> Result<()> {
    let profiles = MemoryProfileStore::new().with_profile(stored("u1"));
    profiles.script("u1", FetchScript::Delay(Duration::from_millis(200)));
    let harness = Harness::new(profiles);
    harness.provider.set_redirect_result(Ok(Identity::new("u1")));
    let _mount = harness.guard.mount("/login");

    sleep(Duration::from_millis(50)).await;
    harness.provider.emit(Some(Identity::new("u1")));
    ensure!(harness.status() == StatusKind::Initializing);
    settle().await;

    ensure!(harness.profiles.fetch_count() == 1);
    ensure!(harness.navigator.issued() == ["/dashboard"]);
    ensure!(harness.status() == StatusKind::Authenticated);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_keeps_user_on_dashboard() -> Result<()> {
    let harness = Harness::new(MemoryProfileStore::new().with_profile(stored("u1")));
    let mount = harness.guard.mount("/dashboard");
    harness.provider.emit(Some(Identity::new("u1")));
    settle().await;
    ensure!(harness.status() == StatusKind::Authenticated);

    harness
        .profiles
        .script("u1", FetchScript::Unavailable(Duration::from_millis(20)));
    mount.refresh_profile();
    settle().await;

    ensure!(harness.navigator.issued().is_empty(), "navigations: {:?}", harness.navigator.issued());
    ensure!(harness.status() == StatusKind::Authenticated);
    let error = harness.store.error().context("refresh error should be shown")?;
    ensure!(matches!(error, AuthError::ProfileFetch(_)));
    ensure!(!error.is_fatal());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unmount_during_profile_fetch_mutates_nothing() -> Result<()> {
    let profiles = MemoryProfileStore::new();
    profiles.script("u2", FetchScript::Delay(Duration::from_millis(100)));
    let harness = Harness::new(profiles);
    let mount = harness.guard.mount("/login");

    harness.provider.emit(Some(Identity::new("u2")));
    sleep(Duration::from_millis(10)).await;
    ensure!(harness.profiles.fetch_count() == 1);

    mount.unmount();
    settle().await;

    ensure!(harness.status() == StatusKind::Initializing);
    ensure!(harness.navigator.issued().is_empty());
    ensure!(harness.profiles.put_count() == 0, "no profile should be created");
    ensure!(harness.provider.observer().listener_count() == 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn last_identity_wins_over_slow_earlier_fetch() -> Result<()> {
    let profiles = MemoryProfileStore::new()
        .with_profile(stored("u1"))
        .with_profile(stored("u2"));
    profiles.script("u1", FetchScript::Delay(Duration::from_millis(200)));
    let harness = Harness::new(profiles);
    let _mount = harness.guard.mount("/login");

    harness.provider.emit(Some(Identity::new("u1")));
    sleep(Duration::from_millis(10)).await;
    harness.provider.emit(Some(Identity::new("u2")));
    settle().await;

    ensure!(harness.uid().as_deref() == Some("u2"), "uid: {:?}", harness.uid());
    ensure!(harness.navigator.issued() == ["/dashboard"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn sign_out_after_slow_fetch_stays_signed_out() -> Result<()> {
    let profiles = MemoryProfileStore::new().with_profile(stored("u1"));
    profiles.script("u1", FetchScript::Delay(Duration::from_millis(200)));
    let harness = Harness::new(profiles);
    let _mount = harness.guard.mount("/dashboard");

    harness.provider.emit(Some(Identity::new("u1")));
    sleep(Duration::from_millis(10)).await;
    harness.provider.emit(None);
    settle().await;

    ensure!(harness.status() == StatusKind::Unauthenticated);
    ensure!(harness.navigator.issued() == ["/login"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn repeated_reports_do_not_navigate_again() -> Result<()> {
    let harness = Harness::new(MemoryProfileStore::new().with_profile(stored("u1")));
    let _mount = harness.guard.mount("/login");

    for _ in 0..3 {
        harness.provider.emit(Some(Identity::new("u1")));
        sleep(Duration::from_millis(20)).await;
    }
    settle().await;

    ensure!(harness.navigator.issued() == ["/dashboard"]);
    ensure!(harness.profiles.fetch_count() == 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn navigations_follow_status_transitions() -> Result<()> {
    let harness = Harness::new(MemoryProfileStore::new().with_profile(stored("u1")));
    let _mount = harness.guard.mount("/login");

    harness.provider.emit(Some(Identity::new("u1")));
    settle().await;
    harness.provider.emit(None);
    settle().await;

    ensure!(harness.navigator.issued() == ["/dashboard", "/login"]);
    ensure!(harness.status() == StatusKind::Unauthenticated);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn remount_reuses_settled_session() -> Result<()> {
    let harness = Harness::new(MemoryProfileStore::new().with_profile(stored("u1")));
    let first = harness.guard.mount("/dashboard");
    harness.provider.emit(Some(Identity::new("u1")));
    settle().await;
    first.unmount();

    let second = harness.guard.mount("/dashboard");
    settle().await;

    ensure!(second.is_active());
    ensure!(harness.profiles.fetch_count() == 1);
    ensure!(harness.provider.redirect_takes() == 1, "redirect result must be taken once");
    ensure!(harness.navigator.issued().is_empty());
    ensure!(harness.status() == StatusKind::Authenticated);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn remount_on_public_route_still_routes_home() -> Result<()> {
    let harness = Harness::new(MemoryProfileStore::new().with_profile(stored("u1")));
    let first = harness.guard.mount("/dashboard");
    harness.provider.emit(Some(Identity::new("u1")));
    settle().await;
    drop(first);

    let _second = harness.guard.mount("/signup");
    settle().await;

    ensure!(harness.navigator.issued() == ["/dashboard"]);
    ensure!(harness.profiles.fetch_count() == 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn in_flight_navigation_is_not_issued_twice() -> Result<()> {
    let navigator = RecordingNavigator::new().with_latency(Duration::from_millis(100));
    let harness = Harness::with_navigator(MemoryProfileStore::new(), navigator);
    let mount = harness.guard.mount("/dashboard");

    harness.provider.emit(None);
    sleep(Duration::from_millis(10)).await;
    ensure!(mount.navigation_in_flight());

    mount.set_path("/dashboard");
    settle().await;

    ensure!(!mount.navigation_in_flight());
    ensure!(harness.navigator.issued() == ["/login"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_navigation_is_not_retried() -> Result<()> {
    let navigator = RecordingNavigator::new();
    navigator.fail_on("/login");
    let harness = Harness::with_navigator(MemoryProfileStore::new(), navigator);
    let mount = harness.guard.mount("/dashboard");

    harness.provider.emit(None);
    settle().await;
    ensure!(harness.navigator.issued() == ["/login"]);

    harness.navigator.clear_failures();
    mount.set_path("/dashboard");
    settle().await;
    ensure!(harness.navigator.issued() == ["/login", "/login"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn backend_outage_on_first_load_never_creates_a_profile() -> Result<()> {
    let profiles = MemoryProfileStore::new();
    profiles.script("u1", FetchScript::Unavailable(Duration::from_millis(20)));
    let harness = Harness::new(profiles);
    let _mount = harness.guard.mount("/dashboard");

    harness.provider.emit(Some(Identity::new("u1")));
    settle().await;

    ensure!(harness.status() == StatusKind::Unauthenticated);
    ensure!(harness.profiles.put_count() == 0);
    ensure!(harness.profiles.get("u1").is_none());
    ensure!(harness.navigator.issued() == ["/login"]);
    ensure!(matches!(harness.store.error(), Some(AuthError::ProfileFetch(_))));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn first_sign_in_creates_profile_needing_setup() -> Result<()> {
    let harness = Harness::new(MemoryProfileStore::new());
    let _mount = harness.guard.mount("/login");

    harness
        .provider
        .emit(Some(Identity::new("u3").with_email("u3@lifeprogress.app")));
    settle().await;

    let profile = harness.store.profile().context("profile")?;
    ensure!(profile.uid == "u3");
    ensure!(profile.email == "u3@lifeprogress.app");
    ensure!(profile.needs_setup());
    ensure!(harness.profiles.put_count() == 1);
    ensure!(harness.navigator.issued() == ["/dashboard"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn redirect_error_is_shown_on_login() -> Result<()> {
    let harness = Harness::new(MemoryProfileStore::new());
    harness
        .provider
        .set_redirect_result(Err("popup closed by user".to_string()));
    let _mount = harness.guard.mount("/login");

    harness.provider.emit(None);
    settle().await;

    ensure!(harness.status() == StatusKind::Unauthenticated);
    ensure!(harness.navigator.issued().is_empty());
    ensure!(matches!(harness.store.error(), Some(AuthError::Redirect(_))));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn observer_failure_before_any_session_signs_out() -> Result<()> {
    let harness = Harness::new(MemoryProfileStore::new());
    harness
        .provider
        .observer()
        .fail(lifeprogress::session::AuthObservationError("provider offline".to_string()));
    let _mount = harness.guard.mount("/dashboard");
    settle().await;

    ensure!(harness.status() == StatusKind::Unauthenticated);
    ensure!(harness.navigator.issued() == ["/login"]);
    ensure!(matches!(harness.store.error(), Some(AuthError::Observation(_))));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn popup_sign_in_flows_through_guard() -> Result<()> {
    let harness = Harness::new(MemoryProfileStore::new().with_profile(stored("u1")));
    let _mount = harness.guard.mount("/login");
    harness.provider.emit(None);
    settle().await;
    ensure!(harness.status() == StatusKind::Unauthenticated);

    harness.provider.push_popup_result(Ok(Identity::new("u1")));
    let login = LoginAction::new(
        harness.provider.clone(),
        BrowserEnvironment::from_user_agent("Mozilla/5.0 (X11; Linux x86_64) Chrome/120.0", "lifeprogress.app"),
        vec!["lifeprogress.app".to_string()],
    );
    let outcome = login.start_sign_in().await?;
    ensure!(outcome == SignInOutcome::Completed(Identity::new("u1")));
    settle().await;

    ensure!(harness.status() == StatusKind::Authenticated);
    ensure!(harness.navigator.issued() == ["/dashboard"]);

    harness.provider.sign_out().await?;
    settle().await;
    ensure!(harness.navigator.issued() == ["/dashboard", "/login"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn late_redirect_success_does_not_undo_sign_out() -> Result<()> {
    let harness = Harness::new(MemoryProfileStore::new().with_profile(stored("u1")));
    harness.provider.set_redirect_result(Ok(Identity::new("u1")));
    harness.provider.set_redirect_delay(Duration::from_millis(300));
    let _mount = harness.guard.mount("/login");

    harness.provider.emit(Some(Identity::new("u1")));
    sleep(Duration::from_millis(50)).await;
    ensure!(harness.status() == StatusKind::Authenticated);

    harness.provider.emit(None);
    settle().await;

    ensure!(harness.guard.redirect_consumed());
    ensure!(harness.status() == StatusKind::Unauthenticated);
    ensure!(
        harness.navigator.issued() == ["/dashboard", "/login"],
        "navigations: {:?}",
        harness.navigator.issued()
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn redirect_outcome_survives_remount_during_resolution() -> Result<()> {
    let harness = Harness::new(MemoryProfileStore::new());
    harness
        .provider
        .set_redirect_result(Err("account disabled".to_string()));
    harness.provider.set_redirect_delay(Duration::from_millis(100));
    let first = harness.guard.mount("/login");
    sleep(Duration::from_millis(10)).await;
    drop(first);

    let _second = harness.guard.mount("/login");
    harness.provider.emit(None);
    settle().await;

    ensure!(harness.status() == StatusKind::Unauthenticated);
    ensure!(
        matches!(harness.store.error(), Some(AuthError::Redirect(_))),
        "error: {:?}",
        harness.store.error()
    );
    ensure!(harness.provider.redirect_takes() == 1);
    ensure!(harness.guard.redirect_consumed());
    ensure!(harness.navigator.issued().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn repeated_sign_out_after_failed_navigation_does_not_navigate() -> Result<()> {
    let navigator = RecordingNavigator::new();
    navigator.fail_on("/login");
    let harness = Harness::with_navigator(MemoryProfileStore::new(), navigator);
    let _mount = harness.guard.mount("/dashboard");

    harness.provider.emit(None);
    settle().await;
    ensure!(harness.navigator.issued() == ["/login"]);

    harness.navigator.clear_failures();
    harness.provider.emit(None);
    harness.provider.emit(None);
    settle().await;

    ensure!(
        harness.navigator.issued() == ["/login"],
        "navigations: {:?}",
        harness.navigator.issued()
    );
    ensure!(harness.status() == StatusKind::Unauthenticated);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn observer_failure_keeps_established_session() -> Result<()> {
    let harness = Harness::new(MemoryProfileStore::new().with_profile(stored("u1")));
    let _mount = harness.guard.mount("/dashboard");
    harness.provider.emit(Some(Identity::new("u1")));
    settle().await;
    ensure!(harness.status() == StatusKind::Authenticated);

    harness
        .provider
        .observer()
        .fail(lifeprogress::session::AuthObservationError("provider offline".to_string()));
    settle().await;

    ensure!(harness.status() == StatusKind::Authenticated);
    ensure!(harness.uid().as_deref() == Some("u1"));
    ensure!(matches!(harness.store.error(), Some(AuthError::Observation(_))));
    ensure!(harness.navigator.issued().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn identity_switch_keeps_previous_user_until_new_profile_loads() -> Result<()> {
    let profiles = MemoryProfileStore::new()
        .with_profile(stored("u1"))
        .with_profile(stored("u2"));
    let harness = Harness::new(profiles);
    let _mount = harness.guard.mount("/dashboard");
    harness.provider.emit(Some(Identity::new("u1")));
    settle().await;

    harness
        .profiles
        .script("u2", FetchScript::Delay(Duration::from_millis(100)));
    harness.provider.emit(Some(Identity::new("u2")));
    sleep(Duration::from_millis(20)).await;
    ensure!(harness.status() == StatusKind::Authenticated);
    ensure!(harness.uid().as_deref() == Some("u1"));

    settle().await;
    ensure!(harness.uid().as_deref() == Some("u2"));
    ensure!(harness.navigator.issued().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_for_switched_identity_signs_out() -> Result<()> {
    let harness = Harness::new(MemoryProfileStore::new().with_profile(stored("u1")));
    let _mount = harness.guard.mount("/dashboard");
    harness.provider.emit(Some(Identity::new("u1")));
    settle().await;

    harness
        .profiles
        .script("u2", FetchScript::Unavailable(Duration::from_millis(100)));
    harness.provider.emit(Some(Identity::new("u2")));
    sleep(Duration::from_millis(20)).await;
    ensure!(harness.status() == StatusKind::Authenticated);
    ensure!(harness.uid().as_deref() == Some("u1"));

    settle().await;
    ensure!(harness.status() == StatusKind::Unauthenticated);
    ensure!(matches!(harness.store.error(), Some(AuthError::ProfileFetch(_))));
    ensure!(harness.profiles.get("u2").is_none());
    ensure!(harness.navigator.issued() == ["/login"]);
    Ok(())
}
