//! Single-flight session refresh with a FIFO queue of waiting callers.
//!
//! The first caller to observe an authentication failure while the coordinator is idle becomes
//! the cycle leader: it flips `in_flight`, issues the refresh call, and settles the cycle.
//! Callers that observe a failure while that call is in flight hand their request to the queue
//! and get it back (or a shared rejection) once the leader settles. A caller whose request went
//! out before the most recent cycle settled adopts that cycle's outcome instead of starting a new
//! refresh, which keeps a burst of stale responses from fanning out into several refresh calls.
//!
//! The state mutex is only held between `.await` points. If the leader's future is dropped
//! mid-refresh, a drop guard resets the state and rejects the queue with
//! [`RefreshError::Abandoned`].

mod metrics;

pub use metrics::RefreshMetrics;

// std
use std::mem;
// crates.io
use ::http::Method;
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	coordinator::{Coordinator, CoordinatedRequest, RequestOptions},
	error::RefreshError,
	http::{CredentialsMode, HttpResponse, HttpTransport},
	nav,
	obs::{self, CallKind, CallOutcome, CallSpan},
	store::StoreAction,
};

/// Mutable refresh bookkeeping shared by every clone of a coordinator.
#[derive(Debug, Default)]
pub(crate) struct RefreshState {
	pub(crate) in_flight: bool,
	/// Number of refresh cycles that have settled.
	pub(crate) cycle: u64,
	/// Failure of the most recently settled cycle, `None` if it succeeded.
	last_failure: Option<Arc<RefreshError>>,
	pub(crate) pending: VecDeque<PendingRequest>,
}

/// A caller parked until the in-flight refresh settles.
#[derive(Debug)]
pub(crate) struct PendingRequest {
	request: CoordinatedRequest,
	settle: oneshot::Sender<Settlement>,
}

#[derive(Debug)]
enum Settlement {
	/// Refresh succeeded; re-issue the returned request.
	Replay(CoordinatedRequest),
	/// Refresh failed; fail with the shared error.
	Reject(Arc<RefreshError>),
}

enum Role {
	Leader(CoordinatedRequest),
	Follower(oneshot::Receiver<Settlement>),
	Settled(Option<Arc<RefreshError>>, CoordinatedRequest),
}

/// Returns the state to idle if a leader never settles its cycle.
struct CycleGuard<'a> {
	state: &'a Mutex<RefreshState>,
	settled: bool,
}
impl<'a> CycleGuard<'a> {
	fn new(state: &'a Mutex<RefreshState>) -> Self {
		Self { state, settled: false }
	}

	/// Closes the cycle and hands back the queue for the leader to drain.
	fn settle(mut self, failure: Option<Arc<RefreshError>>) -> VecDeque<PendingRequest> {
		self.settled = true;

		let mut state = self.state.lock();

		state.in_flight = false;
		state.cycle += 1;
		state.last_failure = failure;

		mem::take(&mut state.pending)
	}
}
impl Drop for CycleGuard<'_> {
	fn drop(&mut self) {
		if self.settled {
			return;
		}

		let pending = {
			let mut state = self.state.lock();

			state.in_flight = false;

			mem::take(&mut state.pending)
		};

		obs::trace_transition("refreshing", "idle", pending.len());

		let abandoned = Arc::new(RefreshError::Abandoned);

		for PendingRequest { settle, .. } in pending {
			let _ = settle.send(Settlement::Reject(abandoned.clone()));
		}
	}
}

impl<T> Coordinator<T>
where
	T: ?Sized + HttpTransport,
{
	/// Resolves an authentication failure observed for `request`.
	///
	/// `observed_cycle` is the settled-cycle count read before `request` was sent.
	pub(crate) async fn recover(
		&self,
		request: CoordinatedRequest,
		observed_cycle: u64,
	) -> Result<HttpResponse> {
		let role = {
			let mut state = self.refresh_state.lock();

			if state.cycle != observed_cycle {
				Role::Settled(state.last_failure.clone(), request)
			} else if state.in_flight {
				let (settle, receiver) = oneshot::channel();

				state.pending.push_back(PendingRequest { request, settle });
				self.refresh_metrics.record_queued();
				obs::trace_transition("refreshing", "refreshing", state.pending.len());

				Role::Follower(receiver)
			} else {
				state.in_flight = true;
				obs::trace_transition("idle", "refreshing", 0);

				Role::Leader(request)
			}
		};

		match role {
			Role::Leader(request) => self.lead_cycle(request).await,
			Role::Follower(receiver) => match receiver.await {
				Ok(Settlement::Replay(request)) => self.dispatch(&request).await,
				Ok(Settlement::Reject(err)) => Err(Error::AuthenticationFailed(err)),
				Err(_) => Err(Error::AuthenticationFailed(Arc::new(RefreshError::Abandoned))),
			},
			Role::Settled(None, request) => self.dispatch(&request).await,
			Role::Settled(Some(err), _) => Err(Error::AuthenticationFailed(err)),
		}
	}

	async fn lead_cycle(&self, request: CoordinatedRequest) -> Result<HttpResponse> {
		let guard = CycleGuard::new(&self.refresh_state);
		let outcome = self.run_refresh().await.map_err(Arc::new);

		if outcome.is_err() {
			let clear = StoreAction::ClearCsrfToken;

			if let Err(e) = self.store.dispatch(clear.clone()) {
				obs::log_store_failure(&clear, &e);
			}
		}

		let pending = guard.settle(outcome.as_ref().err().cloned());

		obs::trace_transition("refreshing", "idle", pending.len());

		match outcome {
			Ok(()) => {
				for PendingRequest { request, settle } in pending {
					let _ = settle.send(Settlement::Replay(request));
				}

				self.dispatch(&request).await
			},
			Err(err) => {
				for PendingRequest { settle, .. } in pending {
					let _ = settle.send(Settlement::Reject(err.clone()));
				}

				nav::redirect_to_sign_in(self.navigator.as_ref(), &self.config.sign_in_path);

				Err(Error::AuthenticationFailed(err))
			},
		}
	}

	/// Performs the refresh call and writes the renewed token to the store.
	async fn run_refresh(&self) -> Result<(), RefreshError> {
		const KIND: CallKind = CallKind::Refresh;

		let span = CallSpan::new(KIND, "run_refresh");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);
		self.refresh_metrics.record_attempt();

		let result = span
			.instrument(async move {
				let url = self.config.refresh_url().map_err(RefreshError::Request)?;
				let options = RequestOptions::default()
					.method(Method::POST)
					.credentials(CredentialsMode::Include);
				let http_request = CoordinatedRequest::new(url, options)
					.to_http(None)
					.map_err(RefreshError::Request)?;
				let response =
					self.transport.send(http_request).await.map_err(RefreshError::Transport)?;
				let status = response.status();

				if !status.is_success() {
					return Err(RefreshError::Rejected { status: status.as_u16() });
				}

				let stored = match super::parse_token_body(response.body())
					.map_err(RefreshError::MalformedResponse)?
					.into_token()
				{
					Some(token) => self.store_token(token),
					None => self.store.dispatch(StoreAction::ClearCsrfToken),
				};

				stored.map_err(RefreshError::Storage)
			})
			.await;

		match &result {
			Ok(()) => {
				self.refresh_metrics.record_success();
				obs::record_call_outcome(KIND, CallOutcome::Success);
			},
			Err(_) => {
				self.refresh_metrics.record_failure();
				obs::record_call_outcome(KIND, CallOutcome::Failure);
			},
		}

		result
	}
}
