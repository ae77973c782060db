//! Compute functions for the config-selectable derivation kinds.

use metrisim_core::calc::{self, Operation};
use metrisim_core::derive::ComputeFn;
use metrisim_core::error::{Result, SimError};
use metrisim_core::{DerivationCtx, DerivedValue, DomainError, RunningStatistic};

use crate::config::DerivationKind;

impl DerivationKind {
    /// Channels the derivation reads, in declaration order.
    pub fn depends_on(&self) -> Vec<&str> {
        match self {
            DerivationKind::Linear { channel, .. } | DerivationKind::RunningAverage { channel } => {
                vec![channel.as_str()]
            }
            DerivationKind::Ratio {
                numerator,
                denominator,
                ..
            } => vec![numerator.as_str(), denominator.as_str()],
            DerivationKind::Calculator { left, right, .. } => {
                let mut deps = vec![left.as_str()];
                deps.extend(right.as_deref());
                deps
            }
        }
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        let finite = |what: &str, v: f64| {
            if v.is_finite() {
                Ok(())
            } else {
                Err(SimError::Config(format!("derivation {name}: {what} must be finite")))
            }
        };
        match self {
            DerivationKind::Linear { scale, offset, .. } => {
                finite("scale", *scale)?;
                finite("offset", *offset)
            }
            DerivationKind::Ratio { scale, .. } => finite("scale", *scale),
            DerivationKind::RunningAverage { .. } => Ok(()),
            DerivationKind::Calculator { op, right, .. } => {
                if right.is_none() && !op.is_unary() {
                    return Err(SimError::Config(format!(
                        "derivation {name}: {op:?} needs a right operand"
                    )));
                }
                Ok(())
            }
        }
    }

    pub fn compute_fn(&self) -> ComputeFn {
        match self.clone() {
            DerivationKind::Linear {
                channel,
                scale,
                offset,
            } => Box::new(move |ctx: &DerivationCtx<'_>| -> DerivedValue {
                ctx.value(&channel).map(|v| offset + scale * v).into()
            }),
            DerivationKind::Ratio {
                numerator,
                denominator,
                scale,
            } => Box::new(move |ctx: &DerivationCtx<'_>| -> DerivedValue {
                match (ctx.value(&numerator), ctx.value(&denominator)) {
                    (Some(n), Some(d)) => match calc::evaluate(Operation::Divide, n, d) {
                        DerivedValue::Number(q) => DerivedValue::number(q * scale),
                        undefined => undefined,
                    },
                    _ => DerivedValue::Undefined(DomainError::MissingInput),
                }
            }),
            DerivationKind::RunningAverage { channel } => {
                Box::new(move |ctx: &DerivationCtx<'_>| -> DerivedValue {
                    match ctx.value(&channel) {
                        Some(v) if v.is_finite() => {
                            let prev = ctx.last_number().unwrap_or(0.0);
                            DerivedValue::number(RunningStatistic::step(prev, ctx.samples() + 1, v))
                        }
                        Some(_) => DerivedValue::Undefined(DomainError::NonFinite),
                        None => DerivedValue::Undefined(DomainError::MissingInput),
                    }
                })
            }
            DerivationKind::Calculator { op, left, right } => {
                Box::new(move |ctx: &DerivationCtx<'_>| -> DerivedValue {
                    let Some(l) = ctx.value(&left) else {
                        return DerivedValue::Undefined(DomainError::MissingInput);
                    };
                    let r = match &right {
                        Some(name) => match ctx.value(name) {
                            Some(r) => r,
                            None => return DerivedValue::Undefined(DomainError::MissingInput),
                        },
                        None if op.is_unary() => 0.0,
                        None => return DerivedValue::Undefined(DomainError::MissingInput),
                    };
                    calc::evaluate(op, l, r)
                })
            }
        }
    }
}
