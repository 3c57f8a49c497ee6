//! Dice rolling and random draws.
//!
//! Every random decision the engine makes goes through a [`Roller`], so a
//! session can run on a seeded RNG and tests can script exact die faces.
//! Dice notation supports `XdY+Z` with optional keep-highest/keep-lowest
//! (`4d6kh3`).

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiceError {
    #[error("'{0}' is not dice notation")]
    BadTerm(String),
    #[error("A die needs at least one side")]
    ZeroSides,
    #[error("Nothing to roll")]
    Empty,
    #[error("{term} keeps {keep} of only {count} dice")]
    KeepTooMany { term: String, keep: u32, count: u32 },
}

/// Source of randomness for the engine.
pub trait Roller: Send {
    /// Roll one die with `sides` faces, returning `1..=sides`.
    fn roll_die(&mut self, sides: u32) -> u32;

    /// Bernoulli draw. Probabilities at or above 1.0 always succeed.
    fn chance(&mut self, probability: f64) -> bool;

    /// Uniform index into a collection of `len` elements (`len > 0`).
    fn pick(&mut self, len: usize) -> usize;
}

impl<R: RngCore + Send> Roller for R {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.gen_range(1..=sides.max(1))
    }

    fn chance(&mut self, probability: f64) -> bool {
        self.gen::<f64>() < probability
    }

    fn pick(&mut self, len: usize) -> usize {
        self.gen_range(0..len.max(1))
    }
}

/// Roll a single die.
pub fn d(roller: &mut dyn Roller, sides: u32) -> u32 {
    roller.roll_die(sides)
}

/// Roll `count` dice of `sides` faces and sum them.
pub fn sum(roller: &mut dyn Roller, count: u32, sides: u32) -> u32 {
    (0..count).map(|_| roller.roll_die(sides)).sum()
}

/// Ability modifier for a score, rounding toward negative infinity:
/// 8-9 → -1, 10-11 → 0, 14-15 → +2.
pub fn modifier(score: u8) -> i32 {
    (score as i32 - 10).div_euclid(2)
}

// ============================================================================
// Notation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Keep {
    Highest(u32),
    Lowest(u32),
}

/// `count` dice of `sides` faces, e.g. the `4d6kh3` in `4d6kh3+1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DicePool {
    pub count: u32,
    pub sides: u32,
    pub keep: Option<Keep>,
}

impl DicePool {
    fn roll(&self, roller: &mut dyn Roller) -> PoolRoll {
        let faces: Vec<u32> = (0..self.count).map(|_| roller.roll_die(self.sides)).collect();

        let mut order: Vec<usize> = (0..faces.len()).collect();
        let kept = match self.keep {
            None => faces.len(),
            Some(Keep::Highest(n)) => {
                order.sort_by_key(|&i| std::cmp::Reverse(faces[i]));
                n as usize
            }
            Some(Keep::Lowest(n)) => {
                order.sort_by_key(|&i| faces[i]);
                n as usize
            }
        };
        let mut dropped = order.split_off(kept.min(order.len()));
        dropped.sort_unstable();

        PoolRoll { faces, dropped }
    }
}

impl fmt::Display for DicePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)?;
        match self.keep {
            Some(Keep::Highest(n)) => write!(f, "kh{n}"),
            Some(Keep::Lowest(n)) => write!(f, "kl{n}"),
            None => Ok(()),
        }
    }
}

/// Parsed dice notation: signed pools plus a flat bonus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    /// Pools with their sign (`-1d4` subtracts).
    pub pools: Vec<(i32, DicePool)>,
    pub flat: i32,
}

impl DiceExpression {
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let compact: String = notation
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        if compact.is_empty() {
            return Err(DiceError::Empty);
        }

        let mut expr = DiceExpression {
            pools: Vec::new(),
            flat: 0,
        };
        for (sign, term) in signed_terms(&compact) {
            if term.is_empty() {
                return Err(DiceError::BadTerm(compact.clone()));
            }
            match term.split_once('d') {
                Some((count, rest)) => expr.pools.push((sign, parse_pool(term, count, rest)?)),
                None => {
                    let value: i32 = term.parse().map_err(|_| DiceError::BadTerm(term.to_string()))?;
                    expr.flat += sign * value;
                }
            }
        }

        if expr.pools.is_empty() && expr.flat == 0 {
            return Err(DiceError::Empty);
        }
        Ok(expr)
    }

    /// One pool with no modifier.
    pub fn pool(count: u32, sides: u32, keep: Option<Keep>) -> Self {
        Self {
            pools: vec![(1, DicePool { count, sides, keep })],
            flat: 0,
        }
    }

    /// `1d{sides}` plus `flat`.
    pub fn single(sides: u32, flat: i32) -> Self {
        Self {
            flat,
            ..Self::pool(1, sides, None)
        }
    }

    pub fn roll_with(&self, roller: &mut dyn Roller) -> RollResult {
        let pools: Vec<(i32, PoolRoll)> = self
            .pools
            .iter()
            .map(|(sign, pool)| (*sign, pool.roll(roller)))
            .collect();
        let total = pools
            .iter()
            .map(|(sign, roll)| sign * roll.kept_sum() as i32)
            .sum::<i32>()
            + self.flat;

        RollResult {
            expression: self.clone(),
            pools,
            total,
        }
    }
}

/// Split `2d6+1d4-1` into `(1, "2d6"), (1, "1d4"), (-1, "1")`.
fn signed_terms(notation: &str) -> Vec<(i32, &str)> {
    let mut terms = Vec::new();
    let mut sign = 1;
    let mut start = 0;
    for (i, ch) in notation.char_indices() {
        if ch == '+' || ch == '-' {
            if i > 0 {
                terms.push((sign, &notation[start..i]));
            }
            sign = if ch == '-' { -1 } else { 1 };
            start = i + 1;
        }
    }
    terms.push((sign, &notation[start..]));
    terms
}

fn parse_pool(term: &str, count: &str, rest: &str) -> Result<DicePool, DiceError> {
    let bad = || DiceError::BadTerm(term.to_string());
    let number = |text: &str| text.parse::<u32>().map_err(|_| bad());

    let count = if count.is_empty() { 1 } else { number(count)? };
    let (sides, keep) = if let Some((sides, n)) = rest.split_once("kh") {
        (sides, Some(Keep::Highest(number(n)?)))
    } else if let Some((sides, n)) = rest.split_once("kl") {
        (sides, Some(Keep::Lowest(number(n)?)))
    } else {
        (rest, None)
    };
    let sides = number(sides)?;

    if sides == 0 {
        return Err(DiceError::ZeroSides);
    }
    if let Some(Keep::Highest(keep) | Keep::Lowest(keep)) = keep {
        if keep > count {
            return Err(DiceError::KeepTooMany {
                term: term.to_string(),
                keep,
                count,
            });
        }
    }
    Ok(DicePool { count, sides, keep })
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (sign, pool)) in self.pools.iter().enumerate() {
            match (i, sign) {
                (0, s) if *s > 0 => write!(f, "{pool}")?,
                (_, s) if *s > 0 => write!(f, "+{pool}")?,
                _ => write!(f, "-{pool}")?,
            }
        }
        match self.flat {
            0 => Ok(()),
            n if n > 0 && !self.pools.is_empty() => write!(f, "+{n}"),
            n => write!(f, "{n}"),
        }
    }
}

/// Faces rolled for one pool; `dropped` indexes faces that don't count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRoll {
    pub faces: Vec<u32>,
    pub dropped: Vec<usize>,
}

impl PoolRoll {
    pub fn kept_sum(&self) -> u32 {
        self.faces
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.dropped.contains(i))
            .map(|(_, face)| face)
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollResult {
    pub expression: DiceExpression,
    pub pools: Vec<(i32, PoolRoll)>,
    pub total: i32,
}

impl RollResult {
    /// Faces per pool with dropped dice in parentheses: `[3, 6, (1), 5] + 2`.
    pub fn dice_display(&self) -> String {
        let mut out = String::new();
        for (i, (sign, roll)) in self.pools.iter().enumerate() {
            if i > 0 || *sign < 0 {
                out.push_str(if *sign < 0 { " - " } else { " + " });
            }
            let faces: Vec<String> = roll
                .faces
                .iter()
                .enumerate()
                .map(|(i, face)| {
                    if roll.dropped.contains(&i) {
                        format!("({face})")
                    } else {
                        face.to_string()
                    }
                })
                .collect();
            out.push('[');
            out.push_str(&faces.join(", "));
            out.push(']');
        }
        match self.expression.flat {
            0 => {}
            n if n > 0 => out.push_str(&format!(" + {n}")),
            n => out.push_str(&format!(" - {}", n.unsigned_abs())),
        }
        out.trim_start().to_string()
    }
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} = {}", self.expression, self.dice_display(), self.total)
    }
}

/// Parse and roll a notation string.
pub fn roll(notation: &str, roller: &mut dyn Roller) -> Result<RollResult, DiceError> {
    Ok(DiceExpression::parse(notation)?.roll_with(roller))
}
