//! Stateful, undoable editing of the document's ordered fragment list.
//!
//! The editor owns the canonical ordered fragment sequence for the document
//! currently being edited. All mutations go through it: insert placeholder,
//! delete, split, merge, move, with a two-stack undo/redo. State transitions
//! are pure list operations; rendering and record re-grouping subscribe as
//! observers and receive the new snapshot after every mutation, so display
//! code never interleaves with mutation.
//!
//! Malformed interactive input (an out-of-range index) is recoverable in
//! this context: operations log a warning and leave the list untouched.

use crate::domain::Fragment;
use crate::processors::Rect;
use tracing::warn;

/// Callback invoked with the new ordered snapshot after each mutation.
pub type EditObserver = Box<dyn FnMut(&[Fragment])>;

/// Editable ordered fragment sequence with undo/redo.
#[derive(Default)]
pub struct OrderingEditor {
    items: Vec<Fragment>,
    undo_stack: Vec<Vec<Fragment>>,
    redo_stack: Vec<Vec<Fragment>>,
    observers: Vec<EditObserver>,
}

impl OrderingEditor {
    /// Creates an empty editor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current ordered items.
    pub fn items(&self) -> &[Fragment] {
        &self.items
    }

    /// Registers an observer notified with the new snapshot after every
    /// mutation (including `setup`, `undo`, and `redo`).
    pub fn subscribe(&mut self, observer: EditObserver) {
        self.observers.push(observer);
    }

    /// Replaces the edited sequence with a fresh document.
    ///
    /// This is a document switch, not an edit: both history stacks are
    /// cleared and the change is not undoable.
    pub fn setup(&mut self, fragments: Vec<Fragment>) {
        self.items = fragments;
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.notify();
    }

    /// Inserts a placeholder fragment at `at`.
    pub fn insert_empty(&mut self, at: usize) {
        if at > self.items.len() {
            warn!(at, len = self.items.len(), "insert_empty index out of range");
            return;
        }
        self.snapshot();
        self.items.insert(at, Fragment::placeholder());
        self.notify();
    }

    /// Removes the fragment at `at`; later items shift left so record
    /// chunking realigns automatically.
    pub fn delete_item(&mut self, at: usize) {
        if at >= self.items.len() {
            warn!(at, len = self.items.len(), "delete_item index out of range");
            return;
        }
        self.snapshot();
        self.items.remove(at);
        self.notify();
    }

    /// Replaces the fragment at `at` with one fragment per entry in `lines`.
    ///
    /// If the original carried a rectangle, the pieces split its horizontal
    /// span proportionally to each piece's character count, keeping the
    /// vertical extent; otherwise the pieces carry no rectangle. An empty
    /// `lines` list is a no-op.
    pub fn split_item(&mut self, at: usize, lines: &[String]) {
        if at >= self.items.len() {
            warn!(at, len = self.items.len(), "split_item index out of range");
            return;
        }
        if lines.is_empty() {
            warn!(at, "split_item called with no lines");
            return;
        }
        self.snapshot();

        let original = self.items.remove(at);
        let rects = split_rects(original.rect, lines);
        for (offset, (line, rect)) in lines.iter().zip(rects).enumerate() {
            let mut piece = original.clone();
            piece.text = line.clone();
            piece.rect = rect;
            self.items.insert(at + offset, piece);
        }
        self.notify();
    }

    /// Merges the fragment at `at` with its successor.
    ///
    /// Texts concatenate without a separator; rectangles union when both are
    /// present, otherwise whichever exists is kept. A no-op on the last
    /// index.
    pub fn merge_with_next(&mut self, at: usize) {
        if at + 1 >= self.items.len() {
            warn!(at, len = self.items.len(), "merge_with_next needs a successor");
            return;
        }
        self.snapshot();

        let second = self.items.remove(at + 1);
        let first = &mut self.items[at];
        first.text.push_str(&second.text);
        first.rect = match (first.rect, second.rect) {
            (Some(a), Some(b)) => Some(a.union(&b)),
            (a, b) => a.or(b),
        };
        first.confidence = first.confidence.min(second.confidence);
        first.is_empty = first.is_empty && second.is_empty;
        self.notify();
    }

    /// Moves the fragment at `from` to position `to` (pop, then insert into
    /// the resulting list).
    pub fn move_item(&mut self, from: usize, to: usize) {
        if from >= self.items.len() || to >= self.items.len() {
            warn!(from, to, len = self.items.len(), "move_item index out of range");
            return;
        }
        if from == to {
            return;
        }
        self.snapshot();
        let item = self.items.remove(from);
        self.items.insert(to, item);
        self.notify();
    }

    /// Restores the state before the most recent mutation.
    pub fn undo(&mut self) {
        match self.undo_stack.pop() {
            Some(previous) => {
                self.redo_stack.push(std::mem::replace(&mut self.items, previous));
                self.notify();
            }
            None => warn!("nothing to undo"),
        }
    }

    /// Re-applies the most recently undone mutation.
    pub fn redo(&mut self) {
        match self.redo_stack.pop() {
            Some(next) => {
                self.undo_stack.push(std::mem::replace(&mut self.items, next));
                self.notify();
            }
            None => warn!("nothing to redo"),
        }
    }

    /// Pushes the pre-mutation state and invalidates the redo history.
    fn snapshot(&mut self) {
        self.undo_stack.push(self.items.clone());
        self.redo_stack.clear();
    }

    fn notify(&mut self) {
        for observer in &mut self.observers {
            observer(&self.items);
        }
    }
}

/// Distributes a split fragment's horizontal span over the pieces,
/// proportionally to character count. Zero total length falls back to equal
/// widths.
fn split_rects(rect: Option<Rect>, lines: &[String]) -> Vec<Option<Rect>> {
    let Some(rect) = rect else {
        return vec![None; lines.len()];
    };
    let char_counts: Vec<usize> = lines.iter().map(|l| l.chars().count()).collect();
    let total: usize = char_counts.iter().sum();

    let mut rects = Vec::with_capacity(lines.len());
    let mut x = rect.x1;
    for (i, &count) in char_counts.iter().enumerate() {
        let fraction = if total == 0 {
            1.0 / char_counts.len() as f32
        } else {
            count as f32 / total as f32
        };
        let width = rect.width() * fraction;
        // Last piece absorbs rounding drift so the pieces tile the span.
        let x2 = if i + 1 == char_counts.len() {
            rect.x2
        } else {
            x + width
        };
        rects.push(Some(Rect::new(x, rect.y1, x2, rect.y2)));
        x = x2;
    }
    rects
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn frag(text: &str, x1: f32, x2: f32) -> Fragment {
        Fragment::new(text, Rect::new(x1, 0.0, x2, 20.0), 0.9)
    }

    fn texts(items: &[Fragment]) -> Vec<&str> {
        items.iter().map(|f| f.text.as_str()).collect()
    }

    fn editor_with(items: Vec<Fragment>) -> OrderingEditor {
        let mut editor = OrderingEditor::new();
        editor.setup(items);
        editor
    }

    #[test]
    fn test_setup_clears_history() {
        let mut editor = editor_with(vec![frag("a", 0.0, 10.0)]);
        editor.insert_empty(0);
        editor.setup(vec![frag("b", 0.0, 10.0)]);
        editor.undo();
        assert_eq!(texts(editor.items()), ["b"]);
    }

    #[test]
    fn test_insert_empty_and_delete() {
        let mut editor = editor_with(vec![frag("a", 0.0, 10.0), frag("b", 20.0, 30.0)]);
        editor.insert_empty(1);
        assert_eq!(texts(editor.items()), ["a", "", "b"]);
        assert!(editor.items()[1].is_empty);

        editor.delete_item(1);
        assert_eq!(texts(editor.items()), ["a", "b"]);
    }

    #[test]
    fn test_split_distributes_width_by_char_count() {
        let mut editor = editor_with(vec![frag("abcd", 0.0, 40.0)]);
        editor.split_item(0, &["a".to_string(), "bcd".to_string()]);
        assert_eq!(texts(editor.items()), ["a", "bcd"]);
        assert_eq!(editor.items()[0].rect, Some(Rect::new(0.0, 0.0, 10.0, 20.0)));
        assert_eq!(editor.items()[1].rect, Some(Rect::new(10.0, 0.0, 40.0, 20.0)));
    }

    #[test]
    fn test_split_rejects_empty_lines() {
        let mut editor = editor_with(vec![frag("a", 0.0, 10.0)]);
        editor.split_item(0, &[]);
        assert_eq!(texts(editor.items()), ["a"]);
        // No snapshot was taken either.
        editor.undo();
        assert_eq!(texts(editor.items()), ["a"]);
    }

    #[test]
    fn test_merge_concats_text_and_unions_rects() {
        let mut editor = editor_with(vec![frag("110101", 0.0, 60.0), frag("1990", 70.0, 110.0)]);
        editor.merge_with_next(0);
        assert_eq!(texts(editor.items()), ["1101011990"]);
        assert_eq!(editor.items()[0].rect, Some(Rect::new(0.0, 0.0, 110.0, 20.0)));
    }

    #[test]
    fn test_merge_on_last_index_is_noop() {
        let mut editor = editor_with(vec![frag("a", 0.0, 10.0)]);
        editor.merge_with_next(0);
        assert_eq!(texts(editor.items()), ["a"]);
    }

    #[test]
    fn test_split_then_merge_restores_text() {
        let mut editor = editor_with(vec![frag("张三李四", 0.0, 40.0)]);
        editor.split_item(0, &["张三".to_string(), "李四".to_string()]);
        editor.merge_with_next(0);
        assert_eq!(texts(editor.items()), ["张三李四"]);
    }

    #[test]
    fn test_move_uses_pop_then_insert_semantics() {
        let mut editor = editor_with(vec![
            frag("a", 0.0, 10.0),
            frag("b", 20.0, 30.0),
            frag("c", 40.0, 50.0),
        ]);
        editor.move_item(0, 2);
        assert_eq!(texts(editor.items()), ["b", "c", "a"]);
        editor.move_item(2, 0);
        assert_eq!(texts(editor.items()), ["a", "b", "c"]);
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut editor = editor_with(vec![frag("a", 0.0, 10.0), frag("b", 20.0, 30.0)]);
        let before = editor.items().to_vec();
        editor.merge_with_next(0);
        let after = editor.items().to_vec();

        editor.undo();
        assert_eq!(editor.items(), before.as_slice());
        editor.redo();
        assert_eq!(editor.items(), after.as_slice());
    }

    #[test]
    fn test_new_mutation_clears_redo() {
        let mut editor = editor_with(vec![frag("a", 0.0, 10.0), frag("b", 20.0, 30.0)]);
        editor.delete_item(1);
        editor.undo();
        editor.insert_empty(0);
        editor.redo(); // nothing to redo; state unchanged
        assert_eq!(texts(editor.items()), ["", "a", "b"]);
    }

    #[test]
    fn test_out_of_range_operations_are_noops() {
        let mut editor = editor_with(vec![frag("a", 0.0, 10.0)]);
        editor.delete_item(5);
        editor.move_item(0, 9);
        editor.split_item(3, &["x".to_string()]);
        assert_eq!(texts(editor.items()), ["a"]);
    }

    #[test]
    fn test_observers_receive_each_snapshot() {
        let seen: Rc<RefCell<Vec<usize>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut editor = OrderingEditor::new();
        editor.subscribe(Box::new(move |items| sink.borrow_mut().push(items.len())));

        editor.setup(vec![frag("a", 0.0, 10.0)]);
        editor.insert_empty(0);
        editor.undo();
        assert_eq!(*seen.borrow(), vec![1, 2, 1]);
    }
}
