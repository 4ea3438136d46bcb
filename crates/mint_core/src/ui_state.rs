//! Enumerated mint-button state derived from wallet, sale and in-flight inputs.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::countdown::Countdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UiState {
    Disconnected,
    /// Wallet connected, sale state not loaded yet.
    Idle,
    CountingDown,
    Ready,
    Minting,
    SoldOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiInputs {
    pub connected: bool,
    pub sale_loaded: bool,
    pub sold_out: bool,
    pub minting: bool,
    pub go_live: DateTime<Utc>,
}

impl UiState {
    pub fn derive(inputs: &UiInputs, now: DateTime<Utc>) -> Self {
        if !inputs.connected {
            Self::Disconnected
        } else if inputs.sold_out {
            Self::SoldOut
        } else if inputs.minting {
            Self::Minting
        } else if !inputs.sale_loaded {
            Self::Idle
        } else if now < inputs.go_live {
            Self::CountingDown
        } else {
            Self::Ready
        }
    }

    pub fn mint_enabled(self) -> bool {
        self == Self::Ready
    }

    pub fn label(self, go_live: DateTime<Utc>, now: DateTime<Utc>) -> String {
        match self {
            Self::Disconnected => "Connect Wallet".to_string(),
            Self::Idle => "Loading sale...".to_string(),
            Self::CountingDown => Countdown::until(go_live, now).render(),
            Self::Ready => "MINT".to_string(),
            Self::Minting => "Minting...".to_string(),
            Self::SoldOut => "SOLD OUT".to_string(),
        }
    }
}

impl fmt::Display for UiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Idle => "idle",
            Self::CountingDown => "counting down",
            Self::Ready => "ready",
            Self::Minting => "minting",
            Self::SoldOut => "sold out",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn inputs(now: DateTime<Utc>) -> UiInputs {
        UiInputs {
            connected: true,
            sale_loaded: true,
            sold_out: false,
            minting: false,
            go_live: now - Duration::minutes(1),
        }
    }

    #[test]
    fn sold_out_disables_mint_regardless_of_other_inputs() {
        let now = Utc::now();
        for minting in [false, true] {
            for go_live in [now - Duration::hours(1), now + Duration::hours(1)] {
                let state = UiState::derive(
                    &UiInputs {
                        sold_out: true,
                        minting,
                        go_live,
                        ..inputs(now)
                    },
                    now,
                );
                assert_eq!(state, UiState::SoldOut);
                assert!(!state.mint_enabled());
                assert_eq!(state.label(go_live, now), "SOLD OUT");
            }
        }
    }

    #[test]
    fn before_go_live_renders_countdown() {
        let now = Utc::now();
        let go_live = now + Duration::seconds(3 * 3600 + 125);
        let state = UiState::derive(
            &UiInputs {
                go_live,
                ..inputs(now)
            },
            now,
        );
        assert_eq!(state, UiState::CountingDown);
        assert!(!state.mint_enabled());
        assert_eq!(
            state.label(go_live, now),
            "3 hours, 2 minutes, 5 seconds"
        );
    }

    #[test]
    fn only_connected_live_idle_sale_is_ready() {
        let now = Utc::now();
        assert_eq!(UiState::derive(&inputs(now), now), UiState::Ready);
        assert_eq!(
            UiState::derive(
                &UiInputs {
                    connected: false,
                    ..inputs(now)
                },
                now
            ),
            UiState::Disconnected
        );
        assert_eq!(
            UiState::derive(
                &UiInputs {
                    minting: true,
                    ..inputs(now)
                },
                now
            ),
            UiState::Minting
        );
        assert_eq!(
            UiState::derive(
                &UiInputs {
                    sale_loaded: false,
                    ..inputs(now)
                },
                now
            ),
            UiState::Idle
        );
    }
}
