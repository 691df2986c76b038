//! Drafts behind the check-in, stock and rating dialogs.
//!
//! Each draft is a small state machine that ends in a [`Submission`]; the
//! renderer only reads them.

use crate::api::Submission;
use crate::models::{CheckIn, Rating, StockReport, BRAND_CATALOG};
use std::collections::BTreeSet;

const MAX_COMMENT_CHARS: usize = 280;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInStep {
    ConfirmOpen,
    PickBrands,
    Review,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckInDraft {
    pub place_id: String,
    pub open_confirm: bool,
    pub brands: BTreeSet<String>,
    pub step: CheckInStep,
    pub cursor: usize,
}

impl CheckInDraft {
    pub fn new(place_id: &str) -> Self {
        Self {
            place_id: place_id.to_string(),
            open_confirm: true,
            brands: BTreeSet::new(),
            step: CheckInStep::ConfirmOpen,
            cursor: 0,
        }
    }

    pub fn answer_open(&mut self, open: bool) {
        if self.step == CheckInStep::ConfirmOpen {
            self.open_confirm = open;
            self.step = CheckInStep::PickBrands;
        }
    }

    pub fn move_cursor(&mut self, delta: isize) {
        self.cursor = wrap(self.cursor, delta, BRAND_CATALOG.len());
    }

    /// Toggles the catalog brand under the cursor.
    pub fn toggle_brand(&mut self) {
        if self.step != CheckInStep::PickBrands {
            return;
        }
        if let Some(entry) = BRAND_CATALOG.get(self.cursor) {
            if !self.brands.remove(entry.id) {
                self.brands.insert(entry.id.to_string());
            }
        }
    }

    pub fn advance(&mut self) {
        self.step = match self.step {
            CheckInStep::ConfirmOpen => CheckInStep::PickBrands,
            CheckInStep::PickBrands | CheckInStep::Review => CheckInStep::Review,
        };
    }

    pub fn back(&mut self) {
        self.step = match self.step {
            CheckInStep::ConfirmOpen | CheckInStep::PickBrands => CheckInStep::ConfirmOpen,
            CheckInStep::Review => CheckInStep::PickBrands,
        };
    }

    /// Only a reviewed draft can be sent.
    pub fn submission(&self) -> Option<Submission> {
        (self.step == CheckInStep::Review).then(|| {
            Submission::CheckIn(CheckIn {
                place_id: self.place_id.clone(),
                open_confirm: self.open_confirm,
                brands: self.brands.iter().cloned().collect(),
            })
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StockDraft {
    pub place_id: String,
    pub cursor: usize,
    pub has_stock: bool,
}

impl StockDraft {
    pub fn new(place_id: &str) -> Self {
        Self {
            place_id: place_id.to_string(),
            cursor: 0,
            has_stock: true,
        }
    }

    pub fn move_cursor(&mut self, delta: isize) {
        self.cursor = wrap(self.cursor, delta, BRAND_CATALOG.len());
    }

    pub fn toggle_stock(&mut self) {
        self.has_stock = !self.has_stock;
    }

    pub fn submission(&self) -> Option<Submission> {
        BRAND_CATALOG.get(self.cursor).map(|entry| {
            Submission::Stock(StockReport {
                place_id: self.place_id.clone(),
                brand: entry.id.to_string(),
                has_stock: self.has_stock,
            })
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatingDraft {
    pub place_id: String,
    pub stars: u8,
    pub comment: String,
}

impl RatingDraft {
    pub fn new(place_id: &str) -> Self {
        Self {
            place_id: place_id.to_string(),
            stars: 0,
            comment: String::new(),
        }
    }

    pub fn set_stars(&mut self, stars: u8) {
        self.stars = stars.clamp(1, 5);
    }

    pub fn push_char(&mut self, c: char) {
        if self.comment.chars().count() < MAX_COMMENT_CHARS {
            self.comment.push(c);
        }
    }

    pub fn pop_char(&mut self) {
        self.comment.pop();
    }

    /// Unrated drafts cannot be sent.
    pub fn submission(&self) -> Option<Submission> {
        (self.stars > 0).then(|| {
            Submission::Rating(Rating {
                place_id: self.place_id.clone(),
                stars: self.stars,
                comment: self.comment.trim().to_string(),
            })
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dialog {
    CheckIn(CheckInDraft),
    Stock(StockDraft),
    Rating(RatingDraft),
}

fn wrap(current: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (current as isize + delta).rem_euclid(len as isize) as usize
}
