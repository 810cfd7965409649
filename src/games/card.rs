//! Bingo card ("cartela") model
//!
//! A card is a 5×5 grid stored row-major. The centre cell is free and always
//! counts as marked; the other 24 cells hold distinct numbers from 1..=90.

use crate::common::types::CardNumber;
use crate::errors::ValidationError;
use crate::games::draw::{DOMAIN_MAX, DOMAIN_MIN};
use crate::games::types::{WinPattern, WinningLine};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::collections::{BTreeSet, HashSet};

pub const GRID_SIZE: usize = 5;
pub const CELL_COUNT: usize = GRID_SIZE * GRID_SIZE;
/// Value stored in the free centre cell
pub const FREE_CELL: u8 = 0;
pub const CENTER_INDEX: usize = CELL_COUNT / 2;

/// Numbers per B/I/N/G/O column over the 1..=90 domain
const COLUMN_SPAN: u8 = 18;
const COLUMN_LETTERS: [char; GRID_SIZE] = ['B', 'I', 'N', 'G', 'O'];

/// B/I/N/G/O column a number belongs to
pub fn column_letter(number: u8) -> Option<char> {
    if !(DOMAIN_MIN..=DOMAIN_MAX).contains(&number) {
        return None;
    }
    COLUMN_LETTERS.get(((number - 1) / COLUMN_SPAN) as usize).copied()
}

/// Call label such as `B-12`
pub fn call_label(number: u8) -> String {
    match column_letter(number) {
        Some(letter) => format!("{}-{}", letter, number),
        None => number.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    card_number: CardNumber,
    numbers: [u8; CELL_COUNT],
    marked: BTreeSet<u8>,
}

impl Card {
    /// Build a card from an explicit grid, validating its shape
    pub fn register(card_number: CardNumber, numbers: &[u8]) -> Result<Self, ValidationError> {
        let numbers: [u8; CELL_COUNT] = numbers.try_into().map_err(|_| {
            ValidationError::InvalidGrid(format!(
                "expected {} cells, got {}",
                CELL_COUNT,
                numbers.len()
            ))
        })?;

        if numbers[CENTER_INDEX] != FREE_CELL {
            return Err(ValidationError::InvalidGrid(
                "centre cell must be the free cell (0)".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(CELL_COUNT);
        for (index, &number) in numbers.iter().enumerate() {
            if index == CENTER_INDEX {
                continue;
            }
            if !(DOMAIN_MIN..=DOMAIN_MAX).contains(&number) {
                return Err(ValidationError::InvalidGrid(format!(
                    "number {} outside {}..={}",
                    number, DOMAIN_MIN, DOMAIN_MAX
                )));
            }
            if !seen.insert(number) {
                return Err(ValidationError::InvalidGrid(format!(
                    "number {} appears more than once",
                    number
                )));
            }
        }

        Ok(Self {
            card_number,
            numbers,
            marked: BTreeSet::new(),
        })
    }

    /// Deterministic pre-printed card for a card number.
    ///
    /// Column `c` holds five numbers from `18c+1..=18c+18`, ascending top to bottom.
    pub fn from_catalogue(card_number: CardNumber) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(u64::from(card_number));
        let mut numbers = [FREE_CELL; CELL_COUNT];

        for column in 0..GRID_SIZE {
            let base = column as u8 * COLUMN_SPAN + 1;
            let mut picks: Vec<u8> = index::sample(&mut rng, COLUMN_SPAN as usize, GRID_SIZE)
                .into_iter()
                .map(|offset| base + offset as u8)
                .collect();
            picks.sort_unstable();
            for (row, number) in picks.into_iter().enumerate() {
                numbers[row * GRID_SIZE + column] = number;
            }
        }
        numbers[CENTER_INDEX] = FREE_CELL;

        Self {
            card_number,
            numbers,
            marked: BTreeSet::new(),
        }
    }

    pub fn card_number(&self) -> CardNumber {
        self.card_number
    }

    pub fn numbers(&self) -> &[u8; CELL_COUNT] {
        &self.numbers
    }

    pub fn marked(&self) -> &BTreeSet<u8> {
        &self.marked
    }

    pub fn contains(&self, number: u8) -> bool {
        number != FREE_CELL && self.numbers.contains(&number)
    }

    /// Mark a called number. Numbers not on the card, or already marked, are ignored.
    pub fn mark(&mut self, number: u8) -> bool {
        self.contains(number) && self.marked.insert(number)
    }

    fn is_cell_marked(&self, index: usize) -> bool {
        index == CENTER_INDEX || self.marked.contains(&self.numbers[index])
    }

    fn line_complete(&self, mut cells: impl Iterator<Item = usize>) -> bool {
        cells.all(|index| self.is_cell_marked(index))
    }

    pub fn has_winning_pattern(&self, pattern: WinPattern) -> bool {
        self.winning_line(pattern).is_some()
    }

    /// First completed line for the pattern, rows before columns before diagonals
    pub fn winning_line(&self, pattern: WinPattern) -> Option<WinningLine> {
        match pattern {
            WinPattern::AnyLine => {
                for row in 0..GRID_SIZE {
                    if self.line_complete((0..GRID_SIZE).map(|col| row * GRID_SIZE + col)) {
                        return Some(WinningLine::Row(row as u8));
                    }
                }
                for col in 0..GRID_SIZE {
                    if self.line_complete((0..GRID_SIZE).map(|row| row * GRID_SIZE + col)) {
                        return Some(WinningLine::Column(col as u8));
                    }
                }
                if self.line_complete((0..GRID_SIZE).map(|i| i * GRID_SIZE + i)) {
                    return Some(WinningLine::Diagonal);
                }
                if self.line_complete((0..GRID_SIZE).map(|i| i * GRID_SIZE + (GRID_SIZE - 1 - i))) {
                    return Some(WinningLine::AntiDiagonal);
                }
                None
            }
            WinPattern::FourCorners => {
                let corners = [0, GRID_SIZE - 1, CELL_COUNT - GRID_SIZE, CELL_COUNT - 1];
                self.line_complete(corners.into_iter())
                    .then_some(WinningLine::FourCorners)
            }
            WinPattern::FullCard => self
                .line_complete(0..CELL_COUNT)
                .then_some(WinningLine::FullCard),
        }
    }
}
