//! Vector primitives.

use crate::backend::cell::{Cell, CellRef};
use crate::backend::error::{EvalResult, SchemeError};
use crate::backend::interp::Interp;

fn want_vector_len(it: &Interp, r: CellRef, who: &str) -> EvalResult<usize> {
    match it.cell(r) {
        Cell::Vector(elems) => Ok(elems.len()),
        _ => Err(SchemeError::Runtime(format!("{}: Requires a vector.", who))),
    }
}

fn want_index(it: &Interp, r: CellRef, len: usize, who: &str) -> EvalResult<usize> {
    match it.cell(r) {
        Cell::Int(i) if *i >= 0 && (*i as usize) < len => Ok(*i as usize),
        _ => Err(SchemeError::Runtime(format!("{}: Illegal reference.", who))),
    }
}

impl Interp {
    /// Convert a proper list into a fresh vector.
    pub fn list_to_vector(&mut self, list: CellRef) -> CellRef {
        let rm = self.reg_mark();
        self.reg_push(list);
        let len = self.list_len(list);
        let mut elems = Vec::with_capacity(len);
        let mut curr = list;
        while self.is_pair(curr) {
            elems.push(self.car(curr));
            curr = self.cdr(curr);
        }
        // The elements stay rooted through the list while we allocate.
        let v = self.alloc(Cell::Vector(elems));
        self.reg_release(rm);
        v
    }
}

/// (VECTOR obj ...)
pub fn op_vector_of(it: &mut Interp) -> EvalResult<()> {
    let rm = it.reg_mark();
    let list = it.gather_vals()?;
    it.reg_push(list);
    let v = it.list_to_vector(list);
    it.vals.push(v)?;
    it.reg_release(rm);
    Ok(())
}

/// (MAKE-VECTOR n obj)
pub fn op_make_vector(it: &mut Interp) -> EvalResult<()> {
    let obj = it.vals.pop()?;
    let n = it.vals.pop()?;
    let n = match it.cell(n) {
        Cell::Int(i) if *i >= 0 => *i as usize,
        _ => {
            return Err(SchemeError::Runtime(
                "MAKE-VECTOR: Requires a non-negative number.".to_string(),
            ))
        }
    };
    let rm = it.reg_mark();
    it.reg_push(obj);
    let v = it.alloc(Cell::Vector(vec![obj; n]));
    it.vals.push(v)?;
    it.reg_release(rm);
    Ok(())
}

/// (VECTOR-LENGTH v)
pub fn op_vector_length(it: &mut Interp) -> EvalResult<()> {
    let v = it.vals.pop()?;
    let len = want_vector_len(it, v, "VECTOR-LENGTH")?;
    let cell = it.int(len as i64);
    it.vals.push(cell)
}

/// (VECTOR-REF v n)
pub fn op_vector_ref(it: &mut Interp) -> EvalResult<()> {
    let n = it.vals.pop()?;
    let v = it.vals.pop()?;
    let len = want_vector_len(it, v, "VECTOR-REF")?;
    let i = want_index(it, n, len, "VECTOR-REF")?;
    let elem = match it.cell(v) {
        Cell::Vector(elems) => elems[i],
        _ => unreachable!("vector kind checked above"),
    };
    it.vals.push(elem)
}

/// (VECTOR-SET! v n obj)
pub fn op_vector_set(it: &mut Interp) -> EvalResult<()> {
    let obj = it.vals.pop()?;
    let n = it.vals.pop()?;
    let v = it.vals.pop()?;
    let len = want_vector_len(it, v, "VECTOR-SET!")?;
    let i = want_index(it, n, len, "VECTOR-SET!")?;
    match it.heap.get_mut(v) {
        Cell::Vector(elems) => elems[i] = obj,
        _ => unreachable!("vector kind checked above"),
    }
    it.vals.push(v)
}

/// (VECTOR-COPY v) - elements are tree-copied.
pub fn op_vector_copy(it: &mut Interp) -> EvalResult<()> {
    let v = it.vals.pop()?;
    if !matches!(it.cell(v), Cell::Vector(_)) {
        return Err(SchemeError::Runtime("VECTOR-COPY: Arg must be a vector.".to_string()));
    }
    let rm = it.reg_mark();
    it.reg_push(v);
    let copy = it.tree_copy(v);
    it.vals.push(copy)?;
    it.reg_release(rm);
    Ok(())
}

/// (VECTOR-FILL! v obj)
pub fn op_vector_fill(it: &mut Interp) -> EvalResult<()> {
    let obj = it.vals.pop()?;
    let v = it.vals.pop()?;
    want_vector_len(it, v, "VECTOR-FILL!")?;
    match it.heap.get_mut(v) {
        Cell::Vector(elems) => {
            for e in elems.iter_mut() {
                *e = obj;
            }
        }
        _ => unreachable!("vector kind checked above"),
    }
    it.vals.push(v)
}

/// (VECTOR->LIST v)
pub fn op_vector_to_list(it: &mut Interp) -> EvalResult<()> {
    let v = it.vals.pop()?;
    let len = want_vector_len(it, v, "VECTOR->LIST")?;
    let rm = it.reg_mark();
    it.reg_push(v);
    let acc = it.reg_push(it.nil);
    for i in (0..len).rev() {
        let elem = match it.cell(v) {
            Cell::Vector(elems) => elems[i],
            _ => unreachable!("vector kind checked above"),
        };
        let lst = it.cons(elem, it.reg(acc));
        it.set_reg(acc, lst);
    }
    let lst = it.reg(acc);
    it.vals.push(lst)?;
    it.reg_release(rm);
    Ok(())
}

/// (LIST->VECTOR l)
pub fn op_list_to_vector(it: &mut Interp) -> EvalResult<()> {
    let l = it.vals.pop()?;
    let rm = it.reg_mark();
    it.reg_push(l);
    let v = it.list_to_vector(l);
    it.vals.push(v)?;
    it.reg_release(rm);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::backend::interp::Interp;

    fn eval_one(src: &str) -> String {
        let mut it = Interp::new().unwrap();
        it.eval_str(src).unwrap().pop().unwrap()
    }

    #[test]
    fn test_vector_construction() {
        assert_eq!(eval_one("(vector 1 2 3)"), "#(1 2 3)");
        assert_eq!(eval_one("(vector)"), "#()");
        assert_eq!(eval_one("(make-vector 3 'x)"), "#(X X X)");
        assert_eq!(eval_one("(make-vector 0 'x)"), "#()");
    }

    #[test]
    fn test_vector_literals() {
        assert_eq!(eval_one("#(1 2 3)"), "#(1 2 3)");
        assert_eq!(eval_one("'#(a b)"), "#(A B)");
    }

    #[test]
    fn test_ref_and_set() {
        assert_eq!(eval_one("(vector-ref #(a b c) 1)"), "B");
        assert_eq!(eval_one("(define v (make-vector 2 0)) (vector-set! v 1 9) v"), "#(0 9)");
    }

    #[test]
    fn test_ref_out_of_bounds() {
        let mut it = Interp::new().unwrap();
        assert!(it.eval_str("(vector-ref #(1) 1)").is_err());
    }

    #[test]
    fn test_length_copy_fill() {
        assert_eq!(eval_one("(vector-length #(1 2 3))"), "3");
        assert_eq!(eval_one("(define v #(1 2)) (vector-fill! v 7) v"), "#(7 7)");
        assert_eq!(
            eval_one("(define v (vector (list 1))) (define w (vector-copy v)) \
                      (set-car! (vector-ref v 0) 9) w"),
            "#((1))"
        );
    }

    #[test]
    fn test_list_conversions() {
        assert_eq!(eval_one("(vector->list #(1 2))"), "(1 2)");
        assert_eq!(eval_one("(list->vector '(1 2))"), "#(1 2)");
    }
}
