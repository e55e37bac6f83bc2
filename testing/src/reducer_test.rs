//! Given-When-Then harness for a single reducer step.
//!
//! [`ReducerTest::run`] inspects the effects as returned. [`ReducerTest::run_async`]
//! drives them to completion and inspects the actions they feed back, which
//! is how the check-in workflow's I/O steps are observed without a consumer.

#![allow(clippy::module_name_repetitions)]

use smart_parking_core::{effect::Effect, reducer::Reducer};
use std::future::Future;
use std::pin::Pin;

enum Check<S, A> {
    State(Box<dyn FnOnce(&S)>),
    Effects(Box<dyn FnOnce(&[Effect<A>])>),
    Actions(Box<dyn FnOnce(&[A])>),
}

/// One reducer step under test.
///
/// ```ignore
/// ReducerTest::new(CheckInReducer::new())
///     .with_env(env)
///     .given_state(CheckInState::new(request))
///     .when_action(CheckInAction::Begin)
///     .then_actions(|fed_back| assert!(matches!(fed_back, [CheckInAction::BookingLoaded { .. }])))
///     .run_async()
///     .await;
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    env: Option<E>,
    given: Option<S>,
    when: Option<A>,
    checks: Vec<Check<S, A>>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Start a test for `reducer`.
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            env: None,
            given: None,
            when: None,
            checks: Vec::new(),
        }
    }

    /// Collaborators the reducer's effects will call.
    #[must_use]
    pub fn with_env(self, env: E) -> Self {
        Self {
            env: Some(env),
            ..self
        }
    }

    /// State before the step.
    #[must_use]
    pub fn given_state(self, state: S) -> Self {
        Self {
            given: Some(state),
            ..self
        }
    }

    /// Action fed to the reducer.
    #[must_use]
    pub fn when_action(self, action: A) -> Self {
        Self {
            when: Some(action),
            ..self
        }
    }

    /// Inspect the state after the step.
    #[must_use]
    pub fn then_state(mut self, check: impl FnOnce(&S) + 'static) -> Self {
        self.checks.push(Check::State(Box::new(check)));
        self
    }

    /// Inspect the returned effects. Skipped by [`run_async`](Self::run_async).
    #[must_use]
    pub fn then_effects(mut self, check: impl FnOnce(&[Effect<A>]) + 'static) -> Self {
        self.checks.push(Check::Effects(Box::new(check)));
        self
    }

    /// Inspect the actions the effects resolve to. Skipped by [`run`](Self::run).
    #[must_use]
    pub fn then_actions(mut self, check: impl FnOnce(&[A]) + 'static) -> Self {
        self.checks.push(Check::Actions(Box::new(check)));
        self
    }

    #[allow(clippy::expect_used)]
    fn step(&mut self) -> (S, Vec<Effect<A>>) {
        let mut state = self.given.take().expect("call given_state() first");
        let action = self.when.take().expect("call when_action() first");
        let env = self.env.as_ref().expect("call with_env() first");
        let effects = self.reducer.reduce(&mut state, action, env).into_vec();
        (state, effects)
    }

    /// Reduce once and run the state and effect checks.
    ///
    /// # Panics
    ///
    /// When the state, action, or environment is missing, or a check fails.
    pub fn run(mut self) {
        let (state, effects) = self.step();
        for check in self.checks {
            match check {
                Check::State(check) => check(&state),
                Check::Effects(check) => check(&effects),
                Check::Actions(_) => {},
            }
        }
    }

    /// Reduce once, await the effects, and run the state and action checks.
    ///
    /// # Panics
    ///
    /// When the state, action, or environment is missing, or a check fails.
    pub async fn run_async(mut self)
    where
        A: Send + 'static,
    {
        let (state, effects) = self.step();
        let fed_back = collect_actions(effects).await;
        for check in self.checks {
            match check {
                Check::State(check) => check(&state),
                Check::Actions(check) => check(&fed_back),
                Check::Effects(_) => {},
            }
        }
    }
}

/// Await `effects` one at a time, in order, keeping every action produced.
///
/// `Parallel` groups are flattened into the same sequence so results are
/// deterministic.
pub fn collect_actions<A>(effects: Vec<Effect<A>>) -> Pin<Box<dyn Future<Output = Vec<A>> + Send>>
where
    A: Send + 'static,
{
    Box::pin(async move {
        let mut fed_back = Vec::new();
        for effect in effects {
            match effect {
                Effect::None => {},
                Effect::Future(fut) => fed_back.extend(fut.await),
                Effect::Parallel(group) | Effect::Sequential(group) => {
                    fed_back.extend(collect_actions(group).await);
                },
            }
        }
        fed_back
    })
}

/// Effect-level checks for [`ReducerTest::then_effects`].
pub mod assertions {
    use smart_parking_core::effect::Effect;

    /// Every effect is `Effect::None`.
    ///
    /// # Panics
    ///
    /// On any effect that does work.
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().all(Effect::is_none),
            "reducer scheduled work: {effects:?}"
        );
    }

    /// Exactly `expected` effects were returned.
    ///
    /// # Panics
    ///
    /// On a count mismatch.
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(effects.len(), expected, "unexpected effect count");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smart_parking_core::{SmallVec, smallvec};

    #[derive(Debug, Default)]
    struct Lot {
        occupied: u32,
    }

    #[derive(Debug, PartialEq)]
    enum Gate {
        Enter,
        EnterAfterScan,
    }

    struct Barrier;

    impl Reducer for Barrier {
        type State = Lot;
        type Action = Gate;
        type Environment = ();

        fn reduce(&self, lot: &mut Lot, action: Gate, _env: &()) -> SmallVec<[Effect<Gate>; 4]> {
            match action {
                Gate::Enter => {
                    lot.occupied += 1;
                    smallvec![Effect::None]
                },
                Gate::EnterAfterScan => smallvec![Effect::chain(vec![
                    Effect::future(async { None }),
                    Effect::future(async { Some(Gate::Enter) }),
                ])],
            }
        }
    }

    #[test]
    fn sync_step_updates_state_without_work() {
        ReducerTest::new(Barrier)
            .with_env(())
            .given_state(Lot::default())
            .when_action(Gate::Enter)
            .then_state(|lot| assert_eq!(lot.occupied, 1))
            .then_effects(|effects| assertions::assert_no_effects(effects))
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();
    }

    #[tokio::test]
    async fn async_step_reports_fed_back_actions() {
        ReducerTest::new(Barrier)
            .with_env(())
            .given_state(Lot::default())
            .when_action(Gate::EnterAfterScan)
            .then_state(|lot| assert_eq!(lot.occupied, 0))
            .then_actions(|fed_back| assert_eq!(fed_back, [Gate::Enter]))
            .run_async()
            .await;
    }
}
