//! Ergonomic testing utilities for reducers
//!
//! This module provides a fluent API for testing reducers with readable Given-When-Then syntax.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use rsvp_core::{SmallVec, effect::Effect, reducer::Reducer};

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for effect assertion functions
type EffectAssertion<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// Several `when_action` calls are applied in order; effects from all of them
/// are collected for the effect assertions.
///
/// # Example
///
/// ```ignore
/// ReducerTest::new(ReservationReducer::new())
///     .with_env(test_environment())
///     .given_state(ReservationState::default())
///     .when_action(ReservationAction::ToggleItem { item: "Coca".into() })
///     .then_state(|state| assert_eq!(state.selection.current(), ["Coca"]))
///     .then_effects(assertions::assert_no_effects)
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    actions: Vec<A>,
    state_assertions: Vec<StateAssertion<S>>,
    effect_assertions: Vec<EffectAssertion<A>>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            actions: Vec::new(),
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Add an action to apply (When)
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.actions.push(action);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the resulting effects (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if initial state, action, or environment is not set,
    /// or if any assertions fail.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        assert!(
            !self.actions.is_empty(),
            "At least one action must be set with when_action()"
        );

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        let mut effects: Vec<Effect<A>> = Vec::new();
        for action in self.actions {
            let produced: SmallVec<[Effect<A>; 4]> =
                self.reducer.reduce(&mut state, action, &env);
            effects.extend(produced);
        }

        for assertion in self.state_assertions {
            assertion(&state);
        }

        for assertion in self.effect_assertions {
            assertion(&effects);
        }
    }
}

/// Helper assertions for effects
pub mod assertions {
    use rsvp_core::effect::Effect;

    /// Assert that there are no effects (or only no-ops)
    ///
    /// # Panics
    ///
    /// Panics if any effect would do work.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().all(Effect::is_none),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert the number of effects
    ///
    /// # Panics
    ///
    /// Panics if the number of effects doesn't match expected.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "Expected {} effects, but found {}",
            expected,
            effects.len()
        );
    }

    /// Assert that effects contain at least one Future effect, at any depth
    ///
    /// # Panics
    ///
    /// Panics if no Future effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_future_effect<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().any(contains_future),
            "Expected at least one Future effect, but none found"
        );
    }

    /// Assert that effects contain at least one Delay effect, at any depth
    ///
    /// # Panics
    ///
    /// Panics if no Delay effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_delay_effect<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().any(contains_delay),
            "Expected at least one Delay effect, but none found"
        );
    }

    fn contains_future<A>(effect: &Effect<A>) -> bool {
        match effect {
            Effect::Future(_) => true,
            Effect::Parallel(inner) | Effect::Sequential(inner) => inner.iter().any(contains_future),
            Effect::None | Effect::Delay { .. } => false,
        }
    }

    fn contains_delay<A>(effect: &Effect<A>) -> bool {
        match effect {
            Effect::Delay { .. } => true,
            Effect::Parallel(inner) | Effect::Sequential(inner) => inner.iter().any(contains_delay),
            Effect::None | Effect::Future(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsvp_core::smallvec;
    use std::time::Duration;

    #[derive(Clone, Debug)]
    struct SeatingState {
        seated: u32,
    }

    #[derive(Clone, Debug)]
    enum SeatingAction {
        Seat,
        Leave,
        RemindLater,
    }

    struct SeatingReducer;

    struct SeatingEnv;

    impl Reducer for SeatingReducer {
        type State = SeatingState;
        type Action = SeatingAction;
        type Environment = SeatingEnv;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                SeatingAction::Seat => {
                    state.seated += 1;
                    smallvec![Effect::None]
                },
                SeatingAction::Leave => {
                    state.seated = state.seated.saturating_sub(1);
                    smallvec![Effect::None]
                },
                SeatingAction::RemindLater => smallvec![Effect::Delay {
                    duration: Duration::from_secs(1),
                    action: Box::new(SeatingAction::Seat),
                }],
            }
        }
    }

    #[test]
    fn seats_a_guest() {
        ReducerTest::new(SeatingReducer)
            .with_env(SeatingEnv)
            .given_state(SeatingState { seated: 0 })
            .when_action(SeatingAction::Seat)
            .then_state(|state| {
                assert_eq!(state.seated, 1);
            })
            .then_effects(|effects| {
                assertions::assert_no_effects(effects);
            })
            .run();
    }

    #[test]
    fn applies_actions_in_order() {
        ReducerTest::new(SeatingReducer)
            .with_env(SeatingEnv)
            .given_state(SeatingState { seated: 0 })
            .when_action(SeatingAction::Leave)
            .when_action(SeatingAction::Seat)
            .when_action(SeatingAction::Seat)
            .then_state(|state| {
                assert_eq!(state.seated, 2);
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 3);
            })
            .run();
    }

    #[test]
    fn finds_nested_delays() {
        ReducerTest::new(SeatingReducer)
            .with_env(SeatingEnv)
            .given_state(SeatingState { seated: 0 })
            .when_action(SeatingAction::RemindLater)
            .then_effects(|effects| {
                assertions::assert_has_delay_effect(effects);
            })
            .run();

        let nested: Vec<Effect<SeatingAction>> = vec![Effect::chain(vec![Effect::Future(
            Box::pin(async { None }),
        )])];
        assertions::assert_has_future_effect(&nested);
    }
}
