use std::time::{Duration, Instant};

use super::board::Board;
use super::task::TaskId;
use crate::store::{StateStore, StoreError};

/// How long a card still counts as dragging after the drag ended, so the click
/// that follows a drop does not open the card.
pub const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Per-card drag state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DragPhase {
    #[default]
    Idle,
    Dragging,
    /// Drag ended; the flag clears once `until` passes.
    Settling { until: Instant },
}

impl DragPhase {
    pub fn is_dragging(&self, now: Instant) -> bool {
        match self {
            Self::Idle => false,
            Self::Dragging => true,
            Self::Settling { until } => now < *until,
        }
    }
}

/// Turns drag gestures into board moves and saves the board after every drop.
///
/// The payload plays the part of the drag data transfer: it holds the id set on
/// drag start and is read back by whichever column receives the drop.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    payload: Option<TaskId>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payload(&self) -> Option<&TaskId> {
        self.payload.as_ref()
    }

    /// IDLE → DRAGGING. Returns false if the card is not on the board.
    pub fn drag_start(&mut self, board: &mut Board, id: &TaskId) -> bool {
        match board.card_mut(id) {
            Some(card) => {
                card.drag = DragPhase::Dragging;
                self.payload = Some(id.clone());
                true
            }
            None => false,
        }
    }

    /// DRAGGING → IDLE after `SETTLE_DELAY`. Also used to cancel a drag.
    pub fn drag_end(&mut self, board: &mut Board, id: &TaskId, now: Instant) {
        if let Some(card) = board.card_mut(id) {
            if card.drag == DragPhase::Dragging {
                card.drag = DragPhase::Settling {
                    until: now + SETTLE_DELAY,
                };
            }
        }
        if self.payload.as_ref() == Some(id) {
            self.payload = None;
        }
    }

    /// Clear drag flags whose settle delay has passed. Returns how many changed.
    pub fn settle(&self, board: &mut Board, now: Instant) -> usize {
        let mut cleared = 0;
        for column in &mut board.columns {
            for card in &mut column.cards {
                if let DragPhase::Settling { until } = card.drag {
                    if now >= until {
                        card.drag = DragPhase::Idle;
                        cleared += 1;
                    }
                }
            }
        }
        cleared
    }

    /// Whether a click on a card should open it.
    pub fn should_open(&self, board: &Board, id: &TaskId, now: Instant) -> bool {
        board
            .card(id)
            .is_some_and(|card| !card.drag.is_dragging(now))
    }

    /// Handle a drop on `column_id`: move the dragged card there (before `before`,
    /// or at the end) and save the full board. Returns false when nothing moved.
    pub fn drop_on<S: StateStore + ?Sized>(
        &mut self,
        board: &mut Board,
        column_id: &str,
        before: Option<&TaskId>,
        store: &S,
    ) -> Result<bool, StoreError> {
        let Some(id) = self.payload.clone() else {
            log::debug!("Drop on '{}' without a drag payload", column_id);
            return Ok(false);
        };
        let Some(target) = board.column_index(column_id) else {
            return Ok(false);
        };
        if !board.columns[target].accepts_drop {
            log::debug!("Column '{}' does not accept drops", column_id);
            return Ok(false);
        }
        let Some((from, idx)) = board.locate(&id) else {
            log::warn!("Dropped card {} is not on the board", id);
            return Ok(false);
        };

        let card = board.columns[from].cards.remove(idx);
        let cards = &mut board.columns[target].cards;
        let position = before
            .filter(|b| **b != id)
            .and_then(|b| cards.iter().position(|c| c.id() == b))
            .unwrap_or(cards.len());
        cards.insert(position, card);

        log::debug!("Moved card {} to column '{}' at {}", id, column_id, position);
        board.save(store)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnSpec;
    use crate::core::task::Task;
    use crate::store::{self, MemoryStore};

    fn board() -> Board {
        Board::seed(
            &[
                ColumnSpec::new("todo", "To Do"),
                ColumnSpec::new("doing", "In Progress"),
                ColumnSpec::new("done", "Done"),
            ],
            vec![Task::new("41", "a"), Task::new("42", "b"), Task::new("43", "c")],
        )
    }

    #[test]
    fn drop_moves_card_and_saves() {
        let store = MemoryStore::new();
        let mut board = board();
        let mut dnd = Reconciler::new();
        let id = TaskId::from("42");

        assert!(dnd.drag_start(&mut board, &id));
        assert!(dnd.drop_on(&mut board, "done", None, &store).unwrap());

        let saved = store::load_board_snapshot(&store).unwrap().unwrap();
        assert!(saved.board_state["done"].contains(&id));
        assert!(!saved.board_state["todo"].contains(&id));
    }

    #[test]
    fn drop_before_reorders_within_column() {
        let store = MemoryStore::new();
        let mut board = board();
        let mut dnd = Reconciler::new();

        dnd.drag_start(&mut board, &TaskId::from("43"));
        dnd.drop_on(&mut board, "todo", Some(&TaskId::from("41")), &store)
            .unwrap();

        let saved = store::load_board_snapshot(&store).unwrap().unwrap();
        let order: Vec<&str> = saved.board_state["todo"].iter().map(|i| i.as_str()).collect();
        assert_eq!(order, vec!["43", "41", "42"]);

        let restored = Board::restore(&[ColumnSpec::new("todo", "To Do")], &saved);
        assert_eq!(restored.columns[0].card_ids(), saved.board_state["todo"]);
    }

    #[test]
    fn drop_without_drag_does_nothing() {
        let store = MemoryStore::new();
        let mut board = board();
        let mut dnd = Reconciler::new();
        assert!(!dnd.drop_on(&mut board, "done", None, &store).unwrap());
        assert!(store::load_board_snapshot(&store).unwrap().is_none());
    }

    #[test]
    fn drop_on_unregistered_column_is_ignored() {
        let store = MemoryStore::new();
        let mut board = board();
        board.columns[2].accepts_drop = false;
        let mut dnd = Reconciler::new();
        dnd.drag_start(&mut board, &TaskId::from("41"));
        assert!(!dnd.drop_on(&mut board, "done", None, &store).unwrap());
        assert_eq!(board.locate(&TaskId::from("41")), Some((0, 0)));
    }

    #[test]
    fn click_right_after_drop_does_not_open() {
        let mut board = board();
        let mut dnd = Reconciler::new();
        let id = TaskId::from("41");
        let t0 = Instant::now();

        assert!(dnd.should_open(&board, &id, t0));
        dnd.drag_start(&mut board, &id);
        assert!(!dnd.should_open(&board, &id, t0));

        dnd.drag_end(&mut board, &id, t0);
        assert!(dnd.payload().is_none());
        assert!(!dnd.should_open(&board, &id, t0 + Duration::from_millis(50)));
        assert!(dnd.should_open(&board, &id, t0 + SETTLE_DELAY));

        assert_eq!(dnd.settle(&mut board, t0 + SETTLE_DELAY), 1);
        assert_eq!(board.card(&id).unwrap().drag, DragPhase::Idle);
    }
}
