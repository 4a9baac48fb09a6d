use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::dnd::DragPhase;
use super::task::{Task, TaskId};
use crate::config::ColumnSpec;
use crate::store::{self, StateStore, StoreError};
use crate::sync::notify::Notifier;
use crate::sync::todos::{self, FetchParams, TaskSource};

/// Column key → card ids in display order.
pub type BoardState = BTreeMap<String, Vec<TaskId>>;

/// Task id → task data, used to rehydrate cards on restore.
pub type TaskIndex = BTreeMap<TaskId, Task>;

/// Everything `save` writes in one store call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub board_state: BoardState,
    pub all_tasks: TaskIndex,
}

/// UI projection of a task.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub task: Task,
    pub drag: DragPhase,
}

impl Card {
    pub fn id(&self) -> &TaskId {
        &self.task.id
    }

    pub fn label(&self) -> &str {
        &self.task.todo
    }
}

/// Build a card for a task. Cards start idle and are always draggable.
pub fn create_card(task: Task) -> Card {
    Card {
        task,
        drag: DragPhase::Idle,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub id: String,
    pub title: String,
    pub cards: Vec<Card>,
    /// Set by `initialize_board`; drops on a column that never registered are ignored.
    pub accepts_drop: bool,
}

impl Column {
    fn from_spec(spec: &ColumnSpec) -> Self {
        Self {
            id: spec.id.clone(),
            title: spec.title.clone(),
            cards: Vec::new(),
            accepts_drop: false,
        }
    }

    pub fn card_ids(&self) -> Vec<TaskId> {
        self.cards.iter().map(|c| c.id().clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    pub columns: Vec<Column>,
}

impl Board {
    pub fn new(specs: &[ColumnSpec]) -> Self {
        Self {
            columns: specs.iter().map(Column::from_spec).collect(),
        }
    }

    /// Register every column as a drop target.
    pub fn initialize_board(&mut self) {
        for column in &mut self.columns {
            column.accepts_drop = true;
        }
    }

    /// Column that receives freshly fetched tasks.
    pub fn default_column_id(&self) -> Option<&str> {
        self.columns.first().map(|c| c.id.as_str())
    }

    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn column_index(&self, id: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.id == id)
    }

    /// (column index, card index) of a card.
    pub fn locate(&self, id: &TaskId) -> Option<(usize, usize)> {
        self.columns.iter().enumerate().find_map(|(ci, column)| {
            column
                .cards
                .iter()
                .position(|card| card.id() == id)
                .map(|idx| (ci, idx))
        })
    }

    pub fn card(&self, id: &TaskId) -> Option<&Card> {
        self.locate(id).map(|(ci, idx)| &self.columns[ci].cards[idx])
    }

    pub fn card_mut(&mut self, id: &TaskId) -> Option<&mut Card> {
        let (ci, idx) = self.locate(id)?;
        Some(&mut self.columns[ci].cards[idx])
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.locate(id).is_some()
    }

    pub fn card_count(&self) -> usize {
        self.columns.iter().map(|c| c.cards.len()).sum()
    }

    /// Append a card for `task` to a column. Returns false when the column is
    /// unknown or the id is already on the board.
    pub fn append_task(&mut self, column_id: &str, task: Task) -> bool {
        if self.contains(&task.id) {
            log::debug!("Card {} already on board, not adding twice", task.id);
            return false;
        }
        match self.columns.iter_mut().find(|c| c.id == column_id) {
            Some(column) => {
                column.cards.push(create_card(task));
                true
            }
            None => false,
        }
    }

    /// Put every task into the default column, in order.
    pub fn seed(specs: &[ColumnSpec], tasks: Vec<Task>) -> Self {
        let mut board = Self::new(specs);
        board.initialize_board();
        if let Some(default_id) = board.default_column_id().map(str::to_string) {
            for task in tasks {
                board.append_task(&default_id, task);
            }
        }
        board
    }

    /// Rebuild a board from a persisted snapshot. Ids missing from the index get a
    /// placeholder task; cards of unknown columns land in the default column.
    pub fn restore(specs: &[ColumnSpec], snapshot: &BoardSnapshot) -> Self {
        let mut board = Self::new(specs);
        board.initialize_board();
        let Some(default_id) = board.default_column_id().map(str::to_string) else {
            return board;
        };

        let known: HashSet<&str> = specs.iter().map(|s| s.id.as_str()).collect();
        // Configured columns first in display order, then leftovers from older layouts.
        let mut order: Vec<&String> = specs
            .iter()
            .filter_map(|s| snapshot.board_state.get_key_value(&s.id).map(|(k, _)| k))
            .collect();
        order.extend(
            snapshot
                .board_state
                .keys()
                .filter(|k| !known.contains(k.as_str())),
        );

        for column_id in order {
            let target = if known.contains(column_id.as_str()) {
                column_id.clone()
            } else {
                log::warn!(
                    "Saved column '{}' no longer exists, moving its cards to '{}'",
                    column_id,
                    default_id
                );
                default_id.clone()
            };
            for id in &snapshot.board_state[column_id] {
                let task = snapshot
                    .all_tasks
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| Task::placeholder(id.clone()));
                board.append_task(&target, task);
            }
        }
        board
    }

    /// Derive the full persisted state from the current board, from scratch.
    pub fn snapshot(&self) -> BoardSnapshot {
        let mut board_state = BoardState::new();
        let mut all_tasks = TaskIndex::new();
        for column in &self.columns {
            board_state.insert(column.id.clone(), column.card_ids());
            for card in &column.cards {
                all_tasks.insert(card.id().clone(), card.task.clone());
            }
        }
        BoardSnapshot {
            board_state,
            all_tasks,
        }
    }

    /// Write the whole board (state and index together) to the store.
    pub fn save<S: StateStore + ?Sized>(&self, store: &S) -> Result<(), StoreError> {
        let snapshot = self.snapshot();
        store::save_board_snapshot(store, &snapshot)?;
        log::debug!("Saved board with {} cards", self.card_count());
        Ok(())
    }
}

/// Restore the saved board, or seed a new one from the first page of the task
/// source and persist it right away.
pub async fn load_board<S, T>(
    specs: &[ColumnSpec],
    store: &S,
    source: &T,
    page_size: u64,
    notifier: &Notifier,
) -> Result<Board, StoreError>
where
    S: StateStore + ?Sized,
    T: TaskSource,
{
    if let Some(snapshot) = store::load_board_snapshot(store)? {
        let board = Board::restore(specs, &snapshot);
        log::info!("Restored board with {} cards", board.card_count());
        return Ok(board);
    }

    let tasks = todos::fetch_todos(source, FetchParams::first_page(page_size), notifier).await;
    let board = Board::seed(specs, tasks);
    board.save(store)?;
    log::info!("Seeded board with {} fetched tasks", board.card_count());
    Ok(board)
}
