//! Route guard: the auth/routing state machine.
//!
//! A mount subscribes to the session observer, resolves the redirect result
//! concurrently, loads the profile for each new identity and turns the
//! resulting status into at most one navigation per status transition.
//!
//! All status writes happen on the mount's own task, in the order the
//! underlying operations complete. Profile loads carry a generation number and
//! results from superseded generations are dropped. Unmounting revokes the
//! mount token, detaches the observer listener and aborts every task the mount
//! started.

use crate::session::{
    error::{
        AuthError, AuthObservationError, NavigationError, ProfileFetchError,
        RedirectResolutionError,
    },
    navigator::Navigator,
    observer::{ObserverEvent, Subscription},
    profile::ProfileStore,
    provider::IdentityProvider,
    redirect::RedirectResolver,
    routes::{normalize_path, RouteDecision, RouteTable},
    store::{AuthStore, AuthWriter},
    types::{AuthStatus, Identity, Profile, RedirectOutcome, StatusKind},
};
use chrono::Utc;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use tokio::{
    sync::mpsc,
    task::{JoinHandle, JoinSet},
};
use tracing::{debug, info, warn};

/// Liveness flag of one mount, checked before every state write.
#[derive(Clone, Debug)]
pub struct MountToken(Arc<AtomicBool>);

impl MountToken {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn revoke(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Identifies a navigation by the inputs that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
struct NavKey {
    status: StatusKind,
    path: String,
}

type InFlightSlot = Arc<Mutex<Option<NavKey>>>;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Marks a navigation as in flight until dropped. The guard drops it after
/// recording the resulting path; an aborted navigation task drops it too.
struct InFlight {
    slot: InFlightSlot,
    key: NavKey,
}

impl InFlight {
    fn claim(slot: &InFlightSlot, key: NavKey) -> Option<Self> {
        let mut current = lock(slot);
        if current.as_ref() == Some(&key) {
            return None;
        }
        *current = Some(key.clone());
        Some(Self {
            slot: slot.clone(),
            key,
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut current = lock(&self.slot);
        if current.as_ref() == Some(&self.key) {
            *current = None;
        }
    }
}

struct Shared<P, S, N> {
    provider: Arc<P>,
    profiles: Arc<S>,
    navigator: Arc<N>,
    routes: RouteTable,
    redirect: RedirectResolver<P>,
    writer: AuthWriter,
}

pub struct RouteGuard<P, S, N> {
    shared: Arc<Shared<P, S, N>>,
    active: Mutex<Option<MountToken>>,
}

impl<P, S, N> RouteGuard<P, S, N>
where
    P: IdentityProvider,
    S: ProfileStore,
    N: Navigator,
{
    /// Takes ownership of the store's writer; after this only the guard can
    /// change the auth status.
    #[must_use]
    pub fn new(
        provider: Arc<P>,
        profiles: Arc<S>,
        navigator: Arc<N>,
        routes: RouteTable,
        writer: AuthWriter,
    ) -> Self {
        let redirect = RedirectResolver::new(provider.clone());
        Self {
            shared: Arc::new(Shared {
                provider,
                profiles,
                navigator,
                routes,
                redirect,
                writer,
            }),
            active: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn store(&self) -> AuthStore {
        self.shared.writer.reader()
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.shared.routes
    }

    #[must_use]
    pub fn redirect_consumed(&self) -> bool {
        self.shared.redirect.is_consumed()
    }

    /// Starts observing at `path`. A previous mount, if still alive, is
    /// revoked first so two mounts never write concurrently.
    pub fn mount(&self, path: &str) -> Mount {
        let token = MountToken::new();
        if let Some(previous) = lock(&self.active).replace(token.clone()) {
            if previous.is_alive() {
                debug!("revoking previous guard mount");
                previous.revoke();
            }
        }

        let subscription = self.shared.provider.observer().subscribe();
        let in_flight: InFlightSlot = Arc::new(Mutex::new(None));
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let mut machine = Machine::new(
            self.shared.clone(),
            token.clone(),
            in_flight.clone(),
            normalize_path(path),
        );
        let task = tokio::spawn(async move {
            machine.run(subscription, commands_rx).await;
        });

        info!(path, "route guard mounted");
        Mount {
            token,
            commands: commands_tx,
            in_flight,
            task,
        }
    }
}

enum Command {
    PathChanged(String),
    RefreshProfile,
}

/// Handle of a mounted guard. Dropping it unmounts.
pub struct Mount {
    token: MountToken,
    commands: mpsc::UnboundedSender<Command>,
    in_flight: InFlightSlot,
    task: JoinHandle<()>,
}

impl Mount {
    /// Reports a route change made outside the guard.
    pub fn set_path(&self, path: &str) {
        let _ = self.commands.send(Command::PathChanged(path.to_string()));
    }

    /// Reloads the profile of the signed-in user in the background. Failures
    /// are reported without signing the user out.
    pub fn refresh_profile(&self) {
        let _ = self.commands.send(Command::RefreshProfile);
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.token.is_alive() && !self.task.is_finished()
    }

    #[must_use]
    pub fn navigation_in_flight(&self) -> bool {
        lock(&self.in_flight).is_some()
    }

    pub fn unmount(self) {
        drop(self);
    }
}

impl Drop for Mount {
    fn drop(&mut self) {
        self.token.revoke();
        self.task.abort();
        debug!("route guard unmounted");
    }
}

/// Where the identity currently being handled stands.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Tracked {
    Loading { uid: String },
    Settled { uid: String },
}

impl Tracked {
    fn uid(&self) -> &str {
        match self {
            Self::Loading { uid } | Self::Settled { uid } => uid,
        }
    }
}

enum TaskEvent {
    Redirect(RedirectOutcome),
    Profile {
        generation: u64,
        identity: Identity,
        refresh: bool,
        result: Result<Profile, ProfileFetchError>,
    },
    Navigated {
        target: String,
        result: Result<(), NavigationError>,
        claim: InFlight,
    },
    Cancelled,
}

struct Machine<P, S, N> {
    shared: Arc<Shared<P, S, N>>,
    token: MountToken,
    in_flight: InFlightSlot,
    path: String,
    tasks: JoinSet<TaskEvent>,
    generation: u64,
    tracked: Option<Tracked>,
    observer_reported: bool,
    observer_identity: Option<Identity>,
    redirect: Option<RedirectOutcome>,
}

async fn next_observer_event(subscription: &mut Option<Subscription>) -> Option<ObserverEvent> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

impl<P, S, N> Machine<P, S, N>
where
    P: IdentityProvider,
    S: ProfileStore,
    N: Navigator,
{
    fn new(
        shared: Arc<Shared<P, S, N>>,
        token: MountToken,
        in_flight: InFlightSlot,
        path: String,
    ) -> Self {
        // A remount keeps the identity the store already settled on, so the
        // observer's replay of it is recognized as a duplicate.
        let tracked = shared
            .writer
            .status()
            .identity()
            .map(|identity| Tracked::Settled {
                uid: identity.uid.clone(),
            });

        Self {
            shared,
            token,
            in_flight,
            path,
            tasks: JoinSet::new(),
            generation: 0,
            tracked,
            observer_reported: false,
            observer_identity: None,
            redirect: None,
        }
    }

    async fn run(
        &mut self,
        subscription: Result<Subscription, AuthObservationError>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        let mut subscription = match subscription {
            Ok(subscription) => Some(subscription),
            Err(err) => {
                self.on_observer_failure(err);
                None
            }
        };

        let shared = self.shared.clone();
        self.tasks.spawn(async move {
            TaskEvent::Redirect(shared.redirect.outcome().await)
        });

        self.evaluate();

        loop {
            tokio::select! {
                event = next_observer_event(&mut subscription) => match event {
                    Some(Ok(identity)) => self.on_observer(identity),
                    Some(Err(err)) => {
                        subscription = None;
                        self.on_observer_failure(err);
                    }
                    None => subscription = None,
                },
                Some(command) = commands.recv() => self.on_command(command),
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => match joined {
                    Ok(event) => self.on_task(event),
                    Err(err) if err.is_cancelled() => {}
                    Err(err) => warn!(error = %err, "guard task failed"),
                },
            }

            if !self.token.is_alive() {
                debug!("guard mount revoked, stopping");
                break;
            }
        }
    }

    fn on_observer(&mut self, identity: Option<Identity>) {
        self.observer_reported = true;
        self.observer_identity.clone_from(&identity);
        match identity {
            Some(identity) => self.on_identity(identity),
            None => self.on_signed_out(),
        }
    }

    fn on_observer_failure(&mut self, err: AuthObservationError) {
        warn!(error = %err, "session observation failed");
        self.write_error(Some(AuthError::from(err)));
        // A session that was already established stays valid.
        if self.shared.writer.status().kind() == StatusKind::Authenticated {
            return;
        }
        self.observer_reported = true;
        self.observer_identity = None;
        self.on_signed_out();
    }

    fn on_identity(&mut self, identity: Identity) {
        if self.tracked.as_ref().map(Tracked::uid) == Some(identity.uid.as_str()) {
            debug!(uid = %identity.uid, "duplicate identity notification ignored");
            return;
        }

        info!(uid = %identity.uid, "identity reported, loading profile");
        self.tracked = Some(Tracked::Loading {
            uid: identity.uid.clone(),
        });
        self.spawn_profile_load(identity, false);
    }

    fn on_signed_out(&mut self) {
        // Supersede any profile load still running for the previous identity.
        self.generation += 1;
        self.tracked = None;

        if self.redirect.is_none() && self.shared.writer.status() == AuthStatus::Unknown {
            debug!("no session yet, waiting for redirect result");
            return;
        }
        if self.write_status(AuthStatus::Unauthenticated) {
            info!("signed out");
            self.evaluate();
        }
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::PathChanged(path) => {
                self.path = normalize_path(&path);
                self.evaluate();
            }
            Command::RefreshProfile => {
                let status = self.shared.writer.status();
                match (status.identity(), &self.tracked) {
                    (Some(identity), Some(Tracked::Settled { uid })) if *uid == identity.uid => {
                        debug!(uid = %identity.uid, "refreshing profile");
                        self.spawn_profile_load(identity.clone(), true);
                    }
                    _ => debug!("profile refresh skipped, no settled session"),
                }
            }
        }
    }

    fn on_task(&mut self, event: TaskEvent) {
        if !self.token.is_alive() {
            return;
        }
        match event {
            TaskEvent::Redirect(outcome) => {
                if self.shared.redirect.claim() {
                    self.on_redirect(outcome);
                } else {
                    debug!("redirect result already delivered to an earlier mount");
                    self.on_redirect(RedirectOutcome::None);
                }
            }
            TaskEvent::Profile {
                generation,
                identity,
                refresh,
                result,
            } => self.on_profile(generation, identity, refresh, result),
            TaskEvent::Navigated {
                target,
                result,
                claim,
            } => match result {
                Ok(()) => {
                    self.path = normalize_path(&target);
                    drop(claim);
                    self.evaluate();
                }
                // Not retried; the next relevant change re-evaluates.
                Err(err) => {
                    drop(claim);
                    warn!(error = %err, "navigation failed");
                }
            },
            TaskEvent::Cancelled => {}
        }
    }

    fn on_redirect(&mut self, outcome: RedirectOutcome) {
        self.redirect = Some(outcome.clone());
        match outcome {
            RedirectOutcome::Success(identity) if self.redirect_is_stale(&identity) => {
                debug!(uid = %identity.uid, "redirect result superseded by observer");
                self.settle_if_signed_out();
            }
            RedirectOutcome::Success(identity) => self.on_identity(identity),
            RedirectOutcome::Error(reason) => {
                self.write_error(Some(AuthError::from(RedirectResolutionError(reason))));
                self.settle_if_signed_out();
            }
            RedirectOutcome::None => self.settle_if_signed_out(),
        }
    }

    /// The observer already reported something newer than this redirect
    /// identity: a different user, or a sign-out that has settled.
    fn redirect_is_stale(&self, identity: &Identity) -> bool {
        if !self.observer_reported {
            return false;
        }
        match &self.observer_identity {
            Some(current) => current.uid != identity.uid,
            None => self.shared.writer.status() != AuthStatus::Unknown,
        }
    }

    /// Both sources have reported and neither produced an identity.
    fn settle_if_signed_out(&mut self) {
        if self.observer_reported && self.observer_identity.is_none() && self.tracked.is_none() {
            self.on_signed_out();
        }
    }

    fn on_profile(
        &mut self,
        generation: u64,
        identity: Identity,
        refresh: bool,
        result: Result<Profile, ProfileFetchError>,
    ) {
        if generation != self.generation {
            debug!(
                uid = %identity.uid,
                generation,
                current = self.generation,
                "stale profile result dropped"
            );
            return;
        }

        self.tracked = Some(Tracked::Settled {
            uid: identity.uid.clone(),
        });

        let changed = match result {
            Ok(profile) => {
                self.write_error(None);
                let changed = self.write_status(AuthStatus::Authenticated { identity, profile });
                if changed {
                    info!("authenticated");
                }
                changed
            }
            Err(err) => {
                let signed_in_as_same = self
                    .shared
                    .writer
                    .status()
                    .identity()
                    .is_some_and(|current| current.uid == identity.uid);

                self.write_error(Some(AuthError::from(err.clone())));
                if refresh && signed_in_as_same {
                    warn!(error = %err, "profile refresh failed, keeping session");
                    return;
                }
                warn!(error = %err, "profile unavailable, denying protected routes");
                self.write_status(AuthStatus::Unauthenticated)
            }
        };
        if changed {
            self.evaluate();
        }
    }

    fn spawn_profile_load(&mut self, identity: Identity, refresh: bool) {
        self.generation += 1;
        let generation = self.generation;
        let profiles = self.shared.profiles.clone();
        let token = self.token.clone();

        self.tasks.spawn(async move {
            match load_profile(&*profiles, &identity, refresh, &token).await {
                Some(result) => TaskEvent::Profile {
                    generation,
                    identity,
                    refresh,
                    result,
                },
                None => TaskEvent::Cancelled,
            }
        });
    }

    /// Applies the routing rule and issues a navigation when it asks for one.
    fn evaluate(&mut self) {
        if !self.token.is_alive() {
            return;
        }
        let status = self.shared.writer.status().kind();
        let RouteDecision::Navigate(target) = self.shared.routes.decide(status, &self.path) else {
            return;
        };

        let key = NavKey {
            status,
            path: self.path.clone(),
        };
        let Some(claim) = InFlight::claim(&self.in_flight, key) else {
            debug!(%target, "navigation already in flight");
            return;
        };

        info!(from = %self.path, %target, "navigating");
        let navigator = self.shared.navigator.clone();
        self.tasks.spawn(async move {
            let result = navigator.navigate(&target).await;
            TaskEvent::Navigated {
                target,
                result,
                claim,
            }
        });
    }

    fn write_status(&self, status: AuthStatus) -> bool {
        self.token.is_alive() && self.shared.writer.set_status(status)
    }

    fn write_error(&self, error: Option<AuthError>) {
        if self.token.is_alive() {
            self.shared.writer.set_error(error);
        }
    }
}

/// Fetches the profile, creating it on a first sign-in. Returns `None` when
/// the mount went away before the profile could be created.
async fn load_profile<S: ProfileStore>(
    profiles: &S,
    identity: &Identity,
    refresh: bool,
    token: &MountToken,
) -> Option<Result<Profile, ProfileFetchError>> {
    let fetched = match profiles.fetch(&identity.uid).await {
        Ok(fetched) => fetched,
        Err(err) => return Some(Err(err)),
    };
    if !token.is_alive() {
        return None;
    }

    let now = Utc::now();
    match fetched {
        Some(profile) if refresh => Some(Ok(profile)),
        Some(mut profile) => {
            profile.last_login_at = now;
            if let Err(err) = profiles.put(profile.clone()).await {
                warn!(error = %err, "could not record last login");
            }
            Some(Ok(profile))
        }
        None => {
            info!(uid = %identity.uid, "first sign-in, creating profile");
            let profile = Profile::for_new_identity(identity, now);
            Some(profiles.put(profile.clone()).await.map(|()| profile))
        }
    }
}
