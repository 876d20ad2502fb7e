//! Application state machine
//!
//! [`App::update`] takes one event, moves the machine to its next state and
//! returns the side effects the runner should perform. It does no I/O of its
//! own: external calls and timers come back as [`Effect`] values, and their
//! outcomes re-enter as [`Event`]s.
//!
//! ```text
//!   Loading ──ok──> SelectingSubscription ──confirm──> (set) ──ok──> ShowingResult ──timer──> quit
//!      │                    ^      ^                      │                │
//!      │ fail               │ back │ back                 │ fail           │ back
//!      v                    │      │                      v                │
//!   Retrying <──retryable── ┴─ Error <──exhausted / not retryable──────────┘
//! ```

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use std::time::Duration;

use crate::classify::{classify, ClassifiedError};
use crate::error::GatewayError;
use crate::retry::{Operation, RetryContext, RetryDecision, RetryPolicy};
use crate::subscription::{find_default, Subscription};

/// How long the result page stays up before the program exits
pub const RESULT_COUNTDOWN: Duration = Duration::from_secs(1);

/// Which screen is active
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppState {
    Loading,
    /// Waiting out a backoff delay, or re-running the failed call
    Retrying { delay: Duration },
    SelectingSubscription,
    /// `countdown` identifies the timer started on entry
    ShowingResult { changed: bool, countdown: u64 },
    Error { cause: GatewayError },
}

/// User intent, already decoded from raw keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Quit,
    Confirm,
    Retry,
    Back,
    Up,
    Down,
    StartFilter,
    FilterChar(char),
    FilterBackspace,
}

/// Everything that can happen to the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Input(Input),
    Resize { width: u16, height: u16 },
    /// Animation tick
    Tick,
    SubscriptionsLoaded(Result<Vec<Subscription>, GatewayError>),
    SubscriptionChanged {
        id: String,
        result: Result<(), GatewayError>,
    },
    /// A scheduled backoff delay elapsed
    RetryDue,
    /// A result-page countdown elapsed
    CountdownElapsed(u64),
}

/// Work for the runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    LoadSubscriptions,
    SetSubscription(String),
    ScheduleRetry(Duration),
    StartCountdown { id: u64, after: Duration },
    Quit,
}

/// The whole application state, owned by the event loop
pub struct App {
    state: AppState,
    subscriptions: Vec<Subscription>,
    selected_id: String,
    retry: RetryContext,
    policy: RetryPolicy,
    result_countdown: Duration,
    cursor: usize,
    filter: Option<String>,
    matcher: SkimMatcherV2,
    in_flight: bool,
    countdown_seq: u64,
    tick: usize,
    size: (u16, u16),
    quit: bool,
}

impl App {
    pub fn new(policy: RetryPolicy, result_countdown: Duration) -> Self {
        Self {
            state: AppState::Loading,
            subscriptions: Vec::new(),
            selected_id: String::new(),
            retry: RetryContext::new(policy.max_attempts),
            policy,
            result_countdown,
            cursor: 0,
            filter: None,
            matcher: SkimMatcherV2::default(),
            in_flight: false,
            countdown_seq: 0,
            tick: 0,
            size: (0, 0),
            quit: false,
        }
    }

    /// Effects to run on startup: the initial load
    pub fn start(&mut self) -> Vec<Effect> {
        self.state = AppState::Loading;
        self.retry.begin(Operation::Load, None);
        self.in_flight = true;
        vec![Effect::LoadSubscriptions]
    }

    // ───────────────────────────────────────────────────────────
    // Accessors for rendering and tests
    // ───────────────────────────────────────────────────────────

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn selected_id(&self) -> &str {
        &self.selected_id
    }

    pub fn retry(&self) -> &RetryContext {
        &self.retry
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn tick(&self) -> usize {
        self.tick
    }

    pub fn size(&self) -> (u16, u16) {
        self.size
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Classification of the error on screen, recomputed on every call
    pub fn error(&self) -> Option<ClassifiedError> {
        match &self.state {
            AppState::Error { cause } => Some(classify(cause)),
            _ => None,
        }
    }

    /// Subscriptions passing the filter, best match first
    pub fn visible(&self) -> Vec<&Subscription> {
        self.visible_indices()
            .into_iter()
            .map(|i| &self.subscriptions[i])
            .collect()
    }

    /// Entry under the cursor
    pub fn highlighted(&self) -> Option<&Subscription> {
        self.visible_indices()
            .get(self.cursor)
            .map(|&i| &self.subscriptions[i])
    }

    fn visible_indices(&self) -> Vec<usize> {
        let pattern = match self.filter.as_deref() {
            Some(p) if !p.is_empty() => p,
            _ => return (0..self.subscriptions.len()).collect(),
        };

        let mut scored: Vec<_> = self
            .subscriptions
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                self.matcher
                    .fuzzy_match(&s.filter_value(), pattern)
                    .map(|score| (i, score))
            })
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.into_iter().map(|(i, _)| i).collect()
    }

    // ───────────────────────────────────────────────────────────
    // Key decoding
    // ───────────────────────────────────────────────────────────

    /// Decode a key press for the current screen
    pub fn map_key(&self, key: KeyEvent) -> Option<Input> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(Input::Quit);
        }

        let filtering =
            self.filter.is_some() && self.state == AppState::SelectingSubscription;
        if filtering {
            return match key.code {
                KeyCode::Enter => Some(Input::Confirm),
                KeyCode::Esc => Some(Input::Back),
                KeyCode::Backspace => Some(Input::FilterBackspace),
                KeyCode::Up => Some(Input::Up),
                KeyCode::Down => Some(Input::Down),
                KeyCode::Char('q') if self.filter.as_deref() == Some("") => Some(Input::Quit),
                KeyCode::Char(c) => Some(Input::FilterChar(c)),
                _ => None,
            };
        }

        match key.code {
            KeyCode::Char('q') => Some(Input::Quit),
            KeyCode::Enter => Some(Input::Confirm),
            KeyCode::Char('r') => Some(Input::Retry),
            KeyCode::Esc => Some(Input::Back),
            KeyCode::Up | KeyCode::Char('k') => Some(Input::Up),
            KeyCode::Down | KeyCode::Char('j') => Some(Input::Down),
            KeyCode::Char('/') => Some(Input::StartFilter),
            _ => None,
        }
    }

    // ───────────────────────────────────────────────────────────
    // Transitions
    // ───────────────────────────────────────────────────────────

    /// Apply one event and return the effects it calls for
    pub fn update(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::Input(Input::Quit) => {
                self.quit = true;
                vec![Effect::Quit]
            }
            Event::Input(input) => self.handle_input(input),
            Event::Resize { width, height } => {
                self.size = (width, height);
                vec![]
            }
            Event::Tick => {
                self.tick = self.tick.wrapping_add(1);
                vec![]
            }
            Event::SubscriptionsLoaded(result) => {
                if !self.accepts_result(Operation::Load) {
                    tracing::debug!("dropping stale list result");
                    return vec![];
                }
                self.in_flight = false;
                match result {
                    Ok(subscriptions) => self.on_loaded(subscriptions),
                    Err(e) => self.on_failure(e),
                }
            }
            Event::SubscriptionChanged { id, result } => {
                if !self.accepts_result(Operation::ChangeSubscription) {
                    tracing::debug!(id = %id, "dropping stale set result");
                    return vec![];
                }
                self.in_flight = false;
                match result {
                    Ok(()) => {
                        self.selected_id = id;
                        self.retry.reset();
                        self.enter_result(true)
                    }
                    Err(e) => self.on_failure(e),
                }
            }
            Event::RetryDue => match self.state {
                AppState::Retrying { .. } if !self.in_flight => self.reinvoke(),
                _ => vec![],
            },
            Event::CountdownElapsed(id) => match self.state {
                AppState::ShowingResult { countdown, .. } if countdown == id => {
                    self.quit = true;
                    vec![Effect::Quit]
                }
                _ => vec![],
            },
        }
    }

    fn handle_input(&mut self, input: Input) -> Vec<Effect> {
        match self.state {
            AppState::Loading | AppState::Retrying { .. } => vec![],
            AppState::SelectingSubscription => self.handle_list_input(input),
            AppState::ShowingResult { .. } => match input {
                Input::Back | Input::Confirm => self.back_to_selection(),
                _ => vec![],
            },
            AppState::Error { .. } => match input {
                Input::Retry if self.retry.attempts_remaining() => {
                    self.state = match self.retry.last_operation {
                        Operation::Load => AppState::Loading,
                        Operation::ChangeSubscription => AppState::Retrying {
                            delay: Duration::ZERO,
                        },
                    };
                    self.reinvoke()
                }
                Input::Back => self.back_to_selection(),
                _ => vec![],
            },
        }
    }

    fn handle_list_input(&mut self, input: Input) -> Vec<Effect> {
        let visible = self.visible_indices().len();
        match input {
            Input::Up => {
                self.cursor = self.cursor.saturating_sub(1);
            }
            Input::Down => {
                self.cursor = (self.cursor + 1).min(visible.saturating_sub(1));
            }
            Input::StartFilter => {
                self.filter = Some(String::new());
            }
            Input::FilterChar(c) => {
                if let Some(filter) = self.filter.as_mut() {
                    filter.push(c);
                    self.cursor = 0;
                }
            }
            Input::FilterBackspace => {
                if let Some(filter) = self.filter.as_mut() {
                    filter.pop();
                    self.cursor = 0;
                }
            }
            Input::Back => {
                if self.filter.is_some() {
                    let keep = self.visible_indices().get(self.cursor).copied();
                    self.filter = None;
                    self.cursor = keep.unwrap_or(0);
                }
            }
            Input::Confirm => {
                if self.in_flight {
                    return vec![];
                }
                if let Some(id) = self.highlighted().map(|s| s.id.clone()) {
                    self.filter = None;
                    return self.change_subscription(id);
                }
            }
            Input::Retry | Input::Quit => {}
        }
        vec![]
    }

    fn change_subscription(&mut self, id: String) -> Vec<Effect> {
        if id == self.selected_id {
            self.retry.reset();
            return self.enter_result(false);
        }
        self.retry.begin(Operation::ChangeSubscription, Some(id.clone()));
        self.in_flight = true;
        vec![Effect::SetSubscription(id)]
    }

    fn on_loaded(&mut self, subscriptions: Vec<Subscription>) -> Vec<Effect> {
        self.retry.reset();
        self.filter = None;
        self.cursor = 0;
        if let Some(index) = find_default(&subscriptions) {
            self.selected_id = subscriptions[index].id.clone();
            self.cursor = index;
        }
        self.subscriptions = subscriptions;
        self.state = AppState::SelectingSubscription;
        vec![]
    }

    fn on_failure(&mut self, error: GatewayError) -> Vec<Effect> {
        match self.retry.record_failure(&error, &self.policy) {
            RetryDecision::Retry { delay } => {
                tracing::info!(
                    attempt = self.retry.attempt_count,
                    max = self.retry.max_attempts,
                    ?delay,
                    %error,
                    "scheduling retry"
                );
                self.state = AppState::Retrying { delay };
                vec![Effect::ScheduleRetry(delay)]
            }
            RetryDecision::GiveUp => {
                tracing::warn!(attempt = self.retry.attempt_count, %error, "giving up");
                self.state = AppState::Error { cause: error };
                vec![]
            }
        }
    }

    /// Run `last_operation` again with its preserved parameters
    fn reinvoke(&mut self) -> Vec<Effect> {
        match self.retry.last_operation {
            Operation::Load => {
                self.in_flight = true;
                vec![Effect::LoadSubscriptions]
            }
            Operation::ChangeSubscription => match self.retry.pending_subscription_id.clone() {
                Some(id) => {
                    self.in_flight = true;
                    vec![Effect::SetSubscription(id)]
                }
                None => self.back_to_selection(),
            },
        }
    }

    fn enter_result(&mut self, changed: bool) -> Vec<Effect> {
        self.countdown_seq += 1;
        self.state = AppState::ShowingResult {
            changed,
            countdown: self.countdown_seq,
        };
        vec![Effect::StartCountdown {
            id: self.countdown_seq,
            after: self.result_countdown,
        }]
    }

    fn back_to_selection(&mut self) -> Vec<Effect> {
        self.retry.reset();
        self.state = AppState::SelectingSubscription;
        vec![]
    }

    fn accepts_result(&self, operation: Operation) -> bool {
        self.in_flight && self.retry.last_operation == operation
    }
}
