use bevy::prelude::*;
use thiserror::Error;

/// Label shown on a tile. Ids grow monotonically as tiles are appended, are
/// unique among the tiles currently present, but a removed tile's id may be
/// handed out again by a later replenishment.
pub type TileId = u32;

/// A numbered grid cell, the unit of selection and merging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tile {
    pub id: TileId,
    /// Last layout position reported by the presentation layer. `None` until
    /// the tile has been laid out at least once.
    pub screen_position: Option<Vec2>,
}

impl Tile {
    const fn new(id: TileId) -> Self {
        Self {
            id,
            screen_position: None,
        }
    }
}

/// Errors surfaced by grid operations. All of them are recoverable; none
/// mutate state when returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("tile {0} is not present in the grid")]
    InvalidTileReference(TileId),
    #[error("invalid tile count range {min}..={max}")]
    InvalidRange { min: u32, max: u32 },
    #[error("another grid operation is already running")]
    ConcurrentOperation,
}

/// One observable step of a grid operation, in the exact order the
/// presentation layer should animate them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridEvent {
    TileAppeared(TileId),
    MergeStarted,
    TileRemoved(TileId),
    MergeAnimationEnded,
    TileAdded(TileId),
    SelectionCleared,
}

#[derive(Debug, Clone, PartialEq)]
enum MergePhase {
    Settle,
    Remove,
    Replenish { remaining: u32 },
}

#[derive(Debug, Clone, PartialEq)]
struct MergeOp {
    phase: MergePhase,
    /// First selected tile at merge start. Survives the merge.
    anchor: Option<TileId>,
    /// Remaining selection snapshot, in selection order. Removal pops from
    /// the back, so the last selected tile is removed first.
    to_remove: Vec<TileId>,
    original_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum ActiveOp {
    Spawn { next_id: TileId, remaining: u32 },
    Merge(MergeOp),
}

/// The tile grid state machine: the ordered tile list, the ordered selection
/// and at most one long-running operation.
///
/// `initialize` and `merge` run as sequences of discrete steps. Starting
/// them only records the operation; each [`TileGrid::advance`] call performs
/// exactly one atomic step and returns the event it produced, so the caller
/// owns all pacing. Running `advance` in a tight loop yields the same final
/// state and event order as a fully animated session.
#[derive(Resource, Debug, Default)]
pub struct TileGrid {
    tiles: Vec<Tile>,
    selected: Vec<TileId>,
    merge_in_progress: bool,
    active_op: Option<ActiveOp>,
}

impl TileGrid {
    /// Tiles in insertion order. The order defines the row-major rendering
    /// position and the compaction direction.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Selected tile ids in selection order; the first entry is the merge
    /// anchor.
    pub fn selected(&self) -> &[TileId] {
        &self.selected
    }

    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.tiles.iter().find(|tile| tile.id == id)
    }

    pub fn contains(&self, id: TileId) -> bool {
        self.tiles.iter().any(|tile| tile.id == id)
    }

    pub fn is_selected(&self, id: TileId) -> bool {
        self.selected.contains(&id)
    }

    /// First selected tile, the survivor of the next merge.
    pub fn anchor(&self) -> Option<TileId> {
        self.selected.first().copied()
    }

    /// Anchor snapshot of the merge currently in flight. Unlike
    /// [`TileGrid::anchor`] this is immune to selection changes made while
    /// the merge is running.
    pub fn merge_anchor(&self) -> Option<TileId> {
        match &self.active_op {
            Some(ActiveOp::Merge(merge)) => merge.anchor,
            _ => None,
        }
    }

    /// True only during the removal window of a merge; gates the scatter
    /// animation in the presentation layer.
    pub const fn merge_in_progress(&self) -> bool {
        self.merge_in_progress
    }

    /// True while an `initialize` or `merge` sequence still has steps left.
    pub const fn is_busy(&self) -> bool {
        self.active_op.is_some()
    }

    /// Starts a grid reset: clears all tiles and the selection, then appends
    /// a uniformly drawn number of tiles in `min_tiles..=max_tiles`, one per
    /// [`TileGrid::advance`] step.
    ///
    /// Replacing the active operation is the cancellation point: a merge in
    /// flight never takes another step against its stale snapshot.
    pub fn begin_initialize(&mut self, min_tiles: u32, max_tiles: u32) -> Result<(), GridError> {
        if min_tiles < 1 || min_tiles > max_tiles {
            return Err(GridError::InvalidRange {
                min: min_tiles,
                max: max_tiles,
            });
        }
        self.merge_in_progress = false;
        self.tiles.clear();
        self.selected.clear();
        self.active_op = Some(ActiveOp::Spawn {
            next_id: 1,
            remaining: fastrand::u32(min_tiles..=max_tiles),
        });
        Ok(())
    }

    /// Appends `id` to the selection. Selecting an already selected tile is
    /// a no-op; the first selection establishes the merge anchor.
    pub fn select(&mut self, id: TileId) -> Result<(), GridError> {
        if !self.contains(id) {
            return Err(GridError::InvalidTileReference(id));
        }
        if !self.selected.contains(&id) {
            self.selected.push(id);
        }
        Ok(())
    }

    /// Drops `id` from the selection if it is there.
    pub fn deselect(&mut self, id: TileId) -> Result<(), GridError> {
        if !self.contains(id) {
            return Err(GridError::InvalidTileReference(id));
        }
        self.selected.retain(|selected| *selected != id);
        Ok(())
    }

    /// Stores the layout position reported by the presentation layer.
    pub fn set_screen_position(&mut self, id: TileId, position: Vec2) -> Result<(), GridError> {
        let tile = self
            .tiles
            .iter_mut()
            .find(|tile| tile.id == id)
            .ok_or(GridError::InvalidTileReference(id))?;
        tile.screen_position = Some(position);
        Ok(())
    }

    /// Starts a merge: snapshots the selection (anchor plus tiles to
    /// remove) and the current tile count, and raises `merge_in_progress`.
    /// The phases then play out one [`TileGrid::advance`] step at a time.
    ///
    /// Rejected while any operation is still running; callers retry once
    /// the grid is no longer busy.
    pub fn begin_merge(&mut self) -> Result<(), GridError> {
        if self.active_op.is_some() {
            return Err(GridError::ConcurrentOperation);
        }
        let anchor = self.selected.first().copied();
        let to_remove = self
            .selected
            .get(1..)
            .map(<[TileId]>::to_vec)
            .unwrap_or_default();
        self.merge_in_progress = true;
        self.active_op = Some(ActiveOp::Merge(MergeOp {
            phase: MergePhase::Settle,
            anchor,
            to_remove,
            original_count: self.tiles.len(),
        }));
        Ok(())
    }

    /// Performs the next atomic step of the active operation and returns the
    /// event it produced, or `None` when the grid is idle.
    pub fn advance(&mut self) -> Option<GridEvent> {
        let op = self.active_op.take()?;
        let (event, next) = match op {
            ActiveOp::Spawn { next_id, remaining } => self.step_spawn(next_id, remaining),
            ActiveOp::Merge(merge) => self.step_merge(merge),
        };
        self.active_op = next;
        Some(event)
    }

    fn step_spawn(&mut self, next_id: TileId, remaining: u32) -> (GridEvent, Option<ActiveOp>) {
        self.tiles.push(Tile::new(next_id));
        let remaining = remaining.saturating_sub(1);
        let next = (remaining > 0).then_some(ActiveOp::Spawn {
            next_id: next_id + 1,
            remaining,
        });
        (GridEvent::TileAppeared(next_id), next)
    }

    fn step_merge(&mut self, mut merge: MergeOp) -> (GridEvent, Option<ActiveOp>) {
        match merge.phase {
            MergePhase::Settle => {
                merge.phase = MergePhase::Remove;
                (GridEvent::MergeStarted, Some(ActiveOp::Merge(merge)))
            }
            MergePhase::Remove => {
                if let Some(id) = merge.to_remove.pop() {
                    self.tiles.retain(|tile| tile.id != id);
                    return (GridEvent::TileRemoved(id), Some(ActiveOp::Merge(merge)));
                }
                // Removal done. The scatter window closes here; compaction
                // and replenishment run with the flag down.
                self.merge_in_progress = false;
                let deficit = merge.original_count.saturating_sub(self.tiles.len()) as u32;
                merge.phase = MergePhase::Replenish { remaining: deficit };
                (GridEvent::MergeAnimationEnded, Some(ActiveOp::Merge(merge)))
            }
            MergePhase::Replenish { remaining } => {
                if remaining > 0 {
                    if let Some(max_id) = self.tiles.iter().map(|tile| tile.id).max() {
                        let id = max_id + 1;
                        self.tiles.push(Tile::new(id));
                        merge.phase = MergePhase::Replenish {
                            remaining: remaining - 1,
                        };
                        return (GridEvent::TileAdded(id), Some(ActiveOp::Merge(merge)));
                    }
                    // An empty grid has no maximum id to continue from, and
                    // will never have one; skip straight to finalization.
                }
                self.selected.clear();
                (GridEvent::SelectionCleared, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(grid: &mut TileGrid) -> Vec<GridEvent> {
        let mut events = Vec::new();
        while let Some(event) = grid.advance() {
            events.push(event);
        }
        events
    }

    fn grid_with(count: u32) -> TileGrid {
        let mut grid = TileGrid::default();
        grid.begin_initialize(count, count)
            .expect("valid fixed range");
        drain(&mut grid);
        grid
    }

    fn ids(grid: &TileGrid) -> Vec<TileId> {
        grid.tiles().iter().map(|tile| tile.id).collect()
    }

    #[test]
    fn initialize_appends_sequential_ids_one_per_step() {
        let mut grid = TileGrid::default();
        grid.begin_initialize(5, 5).expect("valid range");
        assert!(grid.is_busy(), "spawn sequence should be active");

        let events = drain(&mut grid);
        assert_eq!(
            events,
            vec![
                GridEvent::TileAppeared(1),
                GridEvent::TileAppeared(2),
                GridEvent::TileAppeared(3),
                GridEvent::TileAppeared(4),
                GridEvent::TileAppeared(5),
            ],
            "one appearance event per appended tile"
        );
        assert_eq!(ids(&grid), vec![1, 2, 3, 4, 5], "ids are 1..=n in order");
        assert!(!grid.is_busy(), "spawn sequence ends with the last tile");
    }

    #[test]
    fn initialize_single_tile_bounds() {
        let grid = grid_with(1);
        assert_eq!(ids(&grid), vec![1], "initialize(1,1) yields exactly tile 1");
    }

    #[test]
    fn initialize_stays_in_bounds_with_unique_ids() {
        let mut grid = TileGrid::default();
        for _ in 0..1000 {
            grid.begin_initialize(4, 6).expect("valid range");
            drain(&mut grid);
            let count = grid.tiles().len();
            assert!((4..=6).contains(&count), "tile count {count} out of bounds");
            let mut unique = ids(&grid);
            unique.sort_unstable();
            unique.dedup();
            assert_eq!(unique.len(), count, "tile ids must be unique");
        }
    }

    #[test]
    fn initialize_rejects_bad_ranges_without_mutating() {
        let mut grid = grid_with(3);
        assert_eq!(
            grid.begin_initialize(0, 5),
            Err(GridError::InvalidRange { min: 0, max: 5 })
        );
        assert_eq!(
            grid.begin_initialize(6, 2),
            Err(GridError::InvalidRange { min: 6, max: 2 })
        );
        assert_eq!(ids(&grid), vec![1, 2, 3], "rejected call must not touch tiles");
        assert!(!grid.is_busy(), "rejected call must not start a sequence");
    }

    #[test]
    fn selection_keeps_order_and_ignores_duplicates() {
        let mut grid = grid_with(5);
        grid.select(2).expect("tile 2 exists");
        grid.select(4).expect("tile 4 exists");
        grid.select(2).expect("re-selecting is a no-op");
        assert_eq!(grid.selected(), &[2, 4], "selection order is preserved");
        assert_eq!(grid.anchor(), Some(2), "first selection is the anchor");

        grid.deselect(2).expect("tile 2 exists");
        assert_eq!(grid.anchor(), Some(4), "anchor follows the selection order");
        grid.deselect(3).expect("deselecting an unselected tile is a no-op");
        assert_eq!(grid.selected(), &[4]);
    }

    #[test]
    fn selection_rejects_absent_tiles() {
        let mut grid = grid_with(3);
        assert_eq!(grid.select(9), Err(GridError::InvalidTileReference(9)));
        assert_eq!(grid.deselect(9), Err(GridError::InvalidTileReference(9)));
        assert!(grid.selected().is_empty(), "failed calls must not select");
    }

    #[test]
    fn screen_position_reports_are_stored_per_tile() {
        let mut grid = grid_with(2);
        assert_eq!(
            grid.tile(1).and_then(|tile| tile.screen_position),
            None,
            "no position before the first layout report"
        );
        grid.set_screen_position(1, Vec2::new(40.0, -80.0))
            .expect("tile 1 exists");
        assert_eq!(
            grid.tile(1).and_then(|tile| tile.screen_position),
            Some(Vec2::new(40.0, -80.0))
        );
        assert_eq!(
            grid.set_screen_position(7, Vec2::ZERO),
            Err(GridError::InvalidTileReference(7))
        );
    }

    #[test]
    fn merge_scenario_replaces_selected_with_fresh_id() {
        let mut grid = grid_with(5);
        grid.select(2).expect("tile 2 exists");
        grid.select(4).expect("tile 4 exists");
        grid.begin_merge().expect("grid is idle");
        assert!(grid.merge_in_progress(), "flag rises in the pre-phase");

        let events = drain(&mut grid);
        assert_eq!(
            events,
            vec![
                GridEvent::MergeStarted,
                GridEvent::TileRemoved(4),
                GridEvent::MergeAnimationEnded,
                GridEvent::TileAdded(6),
                GridEvent::SelectionCleared,
            ],
            "merge beat sequence"
        );
        assert_eq!(ids(&grid), vec![1, 2, 3, 5, 6], "anchor kept, 4 replaced by 6");
        assert!(grid.selected().is_empty(), "selection clears at the end");
        assert!(!grid.merge_in_progress(), "flag drops before replenishment");
    }

    #[test]
    fn merge_flag_only_covers_the_removal_window() {
        let mut grid = grid_with(4);
        grid.select(1).expect("tile 1 exists");
        grid.select(3).expect("tile 3 exists");
        grid.begin_merge().expect("grid is idle");

        assert_eq!(grid.advance(), Some(GridEvent::MergeStarted));
        assert!(grid.merge_in_progress(), "flag up during the settle beat");
        assert_eq!(grid.advance(), Some(GridEvent::TileRemoved(3)));
        assert!(grid.merge_in_progress(), "flag up while removing");
        assert_eq!(grid.advance(), Some(GridEvent::MergeAnimationEnded));
        assert!(!grid.merge_in_progress(), "flag down for compaction onwards");
    }

    #[test]
    fn merge_removes_in_reverse_selection_order() {
        let mut grid = grid_with(5);
        for id in [5, 3, 1] {
            grid.select(id).expect("tile exists");
        }
        grid.begin_merge().expect("grid is idle");

        let removed: Vec<GridEvent> = drain(&mut grid)
            .into_iter()
            .filter(|event| matches!(event, GridEvent::TileRemoved(_)))
            .collect();
        assert_eq!(
            removed,
            vec![GridEvent::TileRemoved(1), GridEvent::TileRemoved(3)],
            "last selected tile goes first"
        );
    }

    #[test]
    fn merge_restores_count_and_keeps_anchor() {
        let mut grid = grid_with(5);
        for id in [1, 2, 3, 4, 5] {
            grid.select(id).expect("tile exists");
        }
        grid.begin_merge().expect("grid is idle");
        drain(&mut grid);

        assert_eq!(grid.tiles().len(), 5, "tile count is restored");
        assert!(grid.contains(1), "the anchor survives");
        assert_eq!(ids(&grid), vec![1, 2, 3, 4, 5], "replenished from max id 1");
    }

    #[test]
    fn replenished_ids_grow_from_the_maximum() {
        let mut grid = grid_with(5);
        for id in [1, 2, 3] {
            grid.select(id).expect("tile exists");
        }
        grid.begin_merge().expect("grid is idle");

        let added: Vec<GridEvent> = drain(&mut grid)
            .into_iter()
            .filter(|event| matches!(event, GridEvent::TileAdded(_)))
            .collect();
        assert_eq!(
            added,
            vec![GridEvent::TileAdded(6), GridEvent::TileAdded(7)],
            "ids continue strictly above the surviving maximum"
        );

        let mut unique = ids(&grid);
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), grid.tiles().len(), "no id collisions");
    }

    #[test]
    fn merge_with_empty_selection_is_a_cheap_no_op() {
        let mut grid = grid_with(4);
        grid.begin_merge().expect("merging nothing is still valid");

        let events = drain(&mut grid);
        assert_eq!(
            events,
            vec![
                GridEvent::MergeStarted,
                GridEvent::MergeAnimationEnded,
                GridEvent::SelectionCleared,
            ],
            "no removals, no replenishment"
        );
        assert_eq!(ids(&grid), vec![1, 2, 3, 4], "tiles are untouched");
    }

    #[test]
    fn merge_with_lone_anchor_just_deselects_it() {
        let mut grid = grid_with(4);
        grid.select(3).expect("tile 3 exists");
        grid.begin_merge().expect("grid is idle");
        drain(&mut grid);

        assert!(grid.contains(3), "the lone anchor stays in the grid");
        assert!(grid.selected().is_empty(), "but is no longer selected");
        assert_eq!(grid.tiles().len(), 4, "deficit of zero adds nothing");
    }

    #[test]
    fn merge_anchor_snapshot_survives_selection_changes() {
        let mut grid = grid_with(4);
        grid.select(2).expect("tile 2 exists");
        grid.select(4).expect("tile 4 exists");
        grid.begin_merge().expect("grid is idle");

        grid.deselect(2).expect("deselection is legal mid-merge");
        assert_eq!(
            grid.merge_anchor(),
            Some(2),
            "the snapshot ignores later selection changes"
        );
        drain(&mut grid);
        assert_eq!(grid.merge_anchor(), None, "snapshot gone once the merge ends");
        assert!(grid.contains(2), "snapshot anchor still survives");
        assert!(!grid.contains(4));
    }

    #[test]
    fn long_running_operations_are_mutually_exclusive() {
        let mut grid = TileGrid::default();
        grid.begin_initialize(3, 3).expect("valid range");
        assert_eq!(
            grid.begin_merge(),
            Err(GridError::ConcurrentOperation),
            "merge is rejected while spawning"
        );
        drain(&mut grid);

        grid.select(1).expect("tile 1 exists");
        grid.select(2).expect("tile 2 exists");
        grid.begin_merge().expect("grid is idle");
        assert_eq!(
            grid.begin_merge(),
            Err(GridError::ConcurrentOperation),
            "merges never interleave snapshots"
        );
    }

    #[test]
    fn initialize_cancels_a_merge_in_flight() {
        let mut grid = grid_with(5);
        grid.select(1).expect("tile 1 exists");
        grid.select(3).expect("tile 3 exists");
        grid.select(5).expect("tile 5 exists");
        grid.begin_merge().expect("grid is idle");
        assert_eq!(grid.advance(), Some(GridEvent::MergeStarted));
        assert_eq!(grid.advance(), Some(GridEvent::TileRemoved(5)));

        grid.begin_initialize(4, 4)
            .expect("initialize acts as reset at any time");
        assert!(!grid.merge_in_progress(), "cancellation clears the flag");
        assert!(grid.selected().is_empty(), "cancellation clears the selection");

        let events = drain(&mut grid);
        assert_eq!(
            events,
            vec![
                GridEvent::TileAppeared(1),
                GridEvent::TileAppeared(2),
                GridEvent::TileAppeared(3),
                GridEvent::TileAppeared(4),
            ],
            "only the new spawn's steps run; the stale merge emits nothing"
        );
        assert_eq!(ids(&grid), vec![1, 2, 3, 4]);
    }
}
