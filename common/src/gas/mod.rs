use log::trace;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("out of gas while charging for {reason}: needed {needed}, remaining {remaining}")]
pub struct OutOfGas {
    pub reason: &'static str,
    pub needed: u64,
    pub remaining: u64,
}

/// Per-transaction resource counter, either bounded by the fee's gas limit or
/// unbounded for simulation. The infinite variant still tracks consumption so
/// a dry run reports an accurate gas estimate.
#[derive(Debug, Clone)]
pub enum GasMeter {
    Infinite { consumed: u64 },
    Finite { limit: u64, consumed: u64 },
}

impl GasMeter {
    pub fn infinite() -> Self {
        GasMeter::Infinite { consumed: 0 }
    }

    pub fn finite(limit: u64) -> Self {
        GasMeter::Finite { limit, consumed: 0 }
    }

    /// Consume `amount` units. Exhaustion leaves the meter saturated at its
    /// limit; the failed charge is not partially applied.
    pub fn consume(&mut self, amount: u64, reason: &'static str) -> Result<(), OutOfGas> {
        trace!("consuming {} gas for {}", amount, reason);
        match self {
            GasMeter::Infinite { consumed } => {
                *consumed = consumed.saturating_add(amount);
                Ok(())
            }
            GasMeter::Finite { limit, consumed } => {
                let remaining = *limit - *consumed;
                if amount > remaining {
                    *consumed = *limit;
                    return Err(OutOfGas {
                        reason,
                        needed: amount,
                        remaining,
                    });
                }
                *consumed += amount;
                Ok(())
            }
        }
    }

    pub fn consumed(&self) -> u64 {
        match self {
            GasMeter::Infinite { consumed } => *consumed,
            GasMeter::Finite { consumed, .. } => *consumed,
        }
    }

    pub fn limit(&self) -> Option<u64> {
        match self {
            GasMeter::Infinite { .. } => None,
            GasMeter::Finite { limit, .. } => Some(*limit),
        }
    }

    pub fn remaining(&self) -> Option<u64> {
        self.limit().map(|limit| limit - self.consumed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finite_meter_charges_and_exhausts() {
        let mut meter = GasMeter::finite(100);
        meter.consume(60, "first").expect("within limit");
        assert_eq!(meter.consumed(), 60);
        assert_eq!(meter.remaining(), Some(40));

        let err = meter.consume(41, "second").expect_err("over limit");
        assert_eq!(err.needed, 41);
        assert_eq!(err.remaining, 40);
        // Saturated, not partially charged
        assert_eq!(meter.consumed(), 100);
    }

    #[test]
    fn test_infinite_meter_tracks_consumption() {
        let mut meter = GasMeter::infinite();
        meter.consume(1_000_000, "simulation").expect("never exhausts");
        meter.consume(1_000_000, "simulation").expect("never exhausts");
        assert_eq!(meter.consumed(), 2_000_000);
        assert_eq!(meter.limit(), None);
    }
}
