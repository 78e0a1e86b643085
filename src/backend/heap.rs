//! The cell heap: a segmented arena with a free list and a mark-sweep
//! collector.
//!
//! Allocation takes the head of the free list; the interpreter runs a
//! collection when the list is empty (or before every allocation in torture
//! mode) and grows the arena by one segment only when a collection recovers
//! nothing. Cells are never moved or compacted; sweeping resets a dead cell
//! to `Free`, which drops any buffers the variant owned (string bytes,
//! vector elements, bytecode) and reports port slots that must be released.
//!
//! Marking is iterative over an explicit worklist so that cyclic structures
//! (closures capturing environments that reach back into the globals) and
//! deep lists cannot overflow the host stack.

use tracing::debug;

use super::cell::{Cell, CellRef};

/// Cells added per arena growth step.
pub const SEGMENT_CELLS: usize = 500;

/// Counters reported by a sweep.
pub struct SweepStats {
    pub used: usize,
    pub recovered: usize,
    /// Port-table slots owned by cells that died this sweep
    pub freed_ports: Vec<usize>,
}

pub struct Heap {
    cells: Vec<Cell>,
    marks: Vec<bool>,
    free: Option<CellRef>,
    /// Collect before every allocation
    pub torture: bool,
    worklist: Vec<CellRef>,
}

impl Heap {
    pub fn new() -> Self {
        let mut heap = Self {
            cells: Vec::new(),
            marks: Vec::new(),
            free: None,
            torture: false,
            worklist: Vec::new(),
        };
        heap.add_segment();
        heap
    }

    /// Grow the arena by one segment of free cells.
    pub fn add_segment(&mut self) {
        let base = self.cells.len();
        self.cells.reserve(SEGMENT_CELLS);
        self.marks.resize(base + SEGMENT_CELLS, false);
        for i in 0..SEGMENT_CELLS {
            self.cells.push(Cell::Free { next: self.free });
            self.free = Some(CellRef((base + i) as u32));
        }
        debug!(target: "schemetron::gc", cells = self.cells.len(), "added heap segment");
    }

    #[inline]
    pub fn free_is_empty(&self) -> bool {
        self.free.is_none()
    }

    /// Detach the head of the free list.
    pub fn take_free(&mut self) -> Option<CellRef> {
        let head = self.free?;
        match self.cells[head.index()] {
            Cell::Free { next } => self.free = next,
            _ => unreachable!("free list head is not a free cell"),
        }
        self.marks[head.index()] = false;
        Some(head)
    }

    #[inline]
    pub fn set(&mut self, r: CellRef, cell: Cell) {
        self.cells[r.index()] = cell;
    }

    #[inline]
    pub fn get(&self, r: CellRef) -> &Cell {
        &self.cells[r.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, r: CellRef) -> &mut Cell {
        &mut self.cells[r.index()]
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Number of cells currently on the free list.
    pub fn count_free(&self) -> usize {
        let mut n = 0;
        let mut curr = self.free;
        while let Some(r) = curr {
            n += 1;
            curr = match self.cells[r.index()] {
                Cell::Free { next } => next,
                _ => unreachable!("free list contains a live cell"),
            };
        }
        n
    }

    /// Mark everything reachable from `root`.
    pub fn mark(&mut self, root: CellRef) {
        self.worklist.push(root);
        while let Some(r) = self.worklist.pop() {
            let i = r.index();
            if self.marks[i] {
                continue;
            }
            self.marks[i] = true;
            match &self.cells[i] {
                Cell::Free { .. } => unreachable!("marked a free cell"),
                Cell::Nil
                | Cell::True
                | Cell::False
                | Cell::Eof
                | Cell::Int(_)
                | Cell::Float(_)
                | Cell::Symbol(_)
                | Cell::Char(_)
                | Cell::Str(_)
                | Cell::Port { .. }
                | Cell::Primitive(_)
                | Cell::SpecialForm(_)
                | Cell::Resume(_) => {}
                Cell::Pair { car, cdr } => {
                    self.worklist.push(*car);
                    self.worklist.push(*cdr);
                }
                Cell::Closure { params, body, env } => {
                    self.worklist.push(*params);
                    self.worklist.push(*body);
                    self.worklist.push(*env);
                }
                Cell::UserForm { params, body } => {
                    self.worklist.push(*params);
                    self.worklist.push(*body);
                }
                Cell::Continuation { env, exprs, vals, funcs } => {
                    self.worklist.push(*env);
                    self.worklist.push(*exprs);
                    self.worklist.push(*vals);
                    self.worklist.push(*funcs);
                }
                Cell::Bytecode { consts, .. } => {
                    self.worklist.extend(consts.iter().copied());
                }
                Cell::ExecPoint { bytecode, env, .. } => {
                    self.worklist.push(*bytecode);
                    self.worklist.push(*env);
                }
                Cell::Vector(elems) => {
                    self.worklist.extend(elems.iter().copied());
                }
                Cell::Environment { nested, global } => {
                    self.worklist.push(*nested);
                    self.worklist.extend(global.iter().flatten().copied());
                }
            }
        }
    }

    /// Reclaim every unmarked cell and clear the marks on survivors.
    pub fn sweep(&mut self) -> SweepStats {
        let mut stats = SweepStats { used: 0, recovered: 0, freed_ports: Vec::new() };
        for i in 0..self.cells.len() {
            if matches!(self.cells[i], Cell::Free { .. }) {
                continue;
            }
            if self.marks[i] {
                stats.used += 1;
                self.marks[i] = false;
            } else {
                if let Cell::Port { slot, .. } = self.cells[i] {
                    stats.freed_ports.push(slot);
                }
                // Dropping the old variant releases any owned buffers.
                self.cells[i] = Cell::Free { next: self.free };
                self.free = Some(CellRef(i as u32));
                stats.recovered += 1;
            }
        }
        debug!(
            target: "schemetron::gc",
            used = stats.used,
            recovered = stats.recovered,
            "sweep complete"
        );
        stats
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_alloc(heap: &mut Heap, cell: Cell) -> CellRef {
        if heap.free_is_empty() {
            heap.add_segment();
        }
        let r = heap.take_free().unwrap();
        heap.set(r, cell);
        r
    }

    #[test]
    fn test_segment_fills_free_list() {
        let heap = Heap::new();
        assert_eq!(heap.count_free(), SEGMENT_CELLS);
    }

    #[test]
    fn test_unreachable_cells_are_swept() {
        let mut heap = Heap::new();
        let kept = raw_alloc(&mut heap, Cell::Int(1));
        let _lost = raw_alloc(&mut heap, Cell::Int(2));
        heap.mark(kept);
        let stats = heap.sweep();
        assert_eq!(stats.used, 1);
        assert_eq!(stats.recovered, 1);
        assert!(matches!(heap.get(kept), Cell::Int(1)));
    }

    #[test]
    fn test_mark_traverses_pairs() {
        let mut heap = Heap::new();
        let a = raw_alloc(&mut heap, Cell::Int(1));
        let nil = raw_alloc(&mut heap, Cell::Nil);
        let pair = raw_alloc(&mut heap, Cell::Pair { car: a, cdr: nil });
        heap.mark(pair);
        let stats = heap.sweep();
        assert_eq!(stats.used, 3);
        assert!(matches!(heap.get(a), Cell::Int(1)));
    }

    #[test]
    fn test_mark_survives_cycles() {
        let mut heap = Heap::new();
        let nil = raw_alloc(&mut heap, Cell::Nil);
        let a = raw_alloc(&mut heap, Cell::Pair { car: nil, cdr: nil });
        let b = raw_alloc(&mut heap, Cell::Pair { car: a, cdr: a });
        // Tie the knot: a's cdr points back at b.
        heap.set(a, Cell::Pair { car: nil, cdr: b });
        heap.mark(a);
        let stats = heap.sweep();
        assert_eq!(stats.used, 3);
    }

    #[test]
    fn test_sweep_reports_dead_port_slots() {
        let mut heap = Heap::new();
        let _port = raw_alloc(
            &mut heap,
            Cell::Port { slot: 7, dir: crate::backend::cell::PortDir::Input },
        );
        let stats = heap.sweep();
        assert_eq!(stats.freed_ports, vec![7]);
    }

    #[test]
    fn test_swept_cells_are_reusable() {
        let mut heap = Heap::new();
        for _ in 0..SEGMENT_CELLS * 3 {
            let r = raw_alloc(&mut heap, Cell::Int(42));
            // Nothing marks r, so a sweep recovers it.
            heap.sweep();
            assert!(matches!(heap.get(r), Cell::Free { .. }));
        }
        // No segment growth was needed beyond the initial one.
        assert_eq!(heap.cell_count(), SEGMENT_CELLS);
    }
}
