//! List primitives, the assoc/member family, and tree copying.
//!
//! Handlers pop their arguments from the value stack (last argument first,
//! matching left-to-right evaluation) and push one result.

use crate::backend::cell::{Cell, CellRef};
use crate::backend::error::{EvalResult, SchemeError};
use crate::backend::interp::Interp;

impl Interp {
    pub fn set_car(&mut self, pair: CellRef, v: CellRef) -> EvalResult<()> {
        match self.heap.get_mut(pair) {
            Cell::Pair { car, .. } => {
                *car = v;
                Ok(())
            }
            _ => Err(SchemeError::Runtime("SET-CAR!: First arg must be a pair.".to_string())),
        }
    }

    pub fn set_cdr(&mut self, pair: CellRef, v: CellRef) -> EvalResult<()> {
        match self.heap.get_mut(pair) {
            Cell::Pair { cdr, .. } => {
                *cdr = v;
                Ok(())
            }
            _ => Err(SchemeError::Runtime("SET-CDR!: First arg must be a pair.".to_string())),
        }
    }

    /// Deep copy of a tree. Pairs, vectors, bytecode, and the copyable
    /// atoms get fresh cells; singletons and opaque values are shared.
    pub fn tree_copy(&mut self, t: CellRef) -> CellRef {
        match self.cell(t) {
            Cell::Int(i) => {
                let i = *i;
                self.int(i)
            }
            Cell::Float(x) => {
                let x = *x;
                self.float(x)
            }
            Cell::Char(c) => {
                let c = *c;
                self.char_cell(c)
            }
            Cell::Str(s) => {
                let s = s.clone();
                self.string(s)
            }
            Cell::Symbol(id) => {
                let id = *id;
                self.alloc(Cell::Symbol(id))
            }
            Cell::Pair { .. } => {
                let rm = self.reg_mark();
                self.reg_push(t);
                let car = self.tree_copy(self.car(t));
                self.reg_push(car);
                let cdr = self.tree_copy(self.cdr(t));
                let copy = self.cons(car, cdr);
                self.reg_release(rm);
                copy
            }
            Cell::Vector(elems) => {
                let len = elems.len();
                let rm = self.reg_mark();
                self.reg_push(t);
                let copy_slot = self.reg_push(self.nil);
                let copy = self.alloc(Cell::Vector(vec![self.nil; len]));
                self.set_reg(copy_slot, copy);
                for i in 0..len {
                    let elem = match self.cell(t) {
                        Cell::Vector(es) => es[i],
                        _ => unreachable!("vector changed kind during copy"),
                    };
                    let dup = self.tree_copy(elem);
                    let dst = self.reg(copy_slot);
                    match self.heap.get_mut(dst) {
                        Cell::Vector(es) => es[i] = dup,
                        _ => unreachable!("vector changed kind during copy"),
                    }
                }
                let copy = self.reg(copy_slot);
                self.reg_release(rm);
                copy
            }
            Cell::Bytecode { code, consts } => {
                let (code, consts) = (code.clone(), consts.clone());
                let rm = self.reg_mark();
                self.reg_push(t);
                let copy = self.alloc(Cell::Bytecode { code, consts });
                self.reg_release(rm);
                copy
            }
            // Singletons and opaque values share their cell.
            _ => t,
        }
    }

    /// First a-list pair whose key is `equal?` to `key`, or `#F`.
    pub fn assoc_by(
        &self,
        key: CellRef,
        mut alist: CellRef,
        pred: fn(&Interp, CellRef, CellRef) -> bool,
    ) -> CellRef {
        while self.is_pair(alist) {
            let head = self.car(alist);
            if pred(self, self.car(head), key) {
                return head;
            }
            alist = self.cdr(alist);
        }
        self.f
    }

    /// First sublist whose car matches `key`, or `#F`.
    pub fn member_by(
        &self,
        key: CellRef,
        mut list: CellRef,
        pred: fn(&Interp, CellRef, CellRef) -> bool,
    ) -> CellRef {
        while self.is_pair(list) {
            if pred(self, self.car(list), key) {
                return list;
            }
            list = self.cdr(list);
        }
        self.f
    }
}

/// (CAR obj)
pub fn op_car(it: &mut Interp) -> EvalResult<()> {
    let l = it.vals.pop()?;
    let car = it.car(l);
    it.vals.push(car)
}

/// (CDR obj)
pub fn op_cdr(it: &mut Interp) -> EvalResult<()> {
    let l = it.vals.pop()?;
    let cdr = it.cdr(l);
    it.vals.push(cdr)
}

/// (CONS obj1 obj2)
pub fn op_cons(it: &mut Interp) -> EvalResult<()> {
    let tail = it.vals.pop()?;
    let head = it.vals.pop()?;
    let pair = it.cons(head, tail);
    it.vals.push(pair)
}

/// (SET-CAR! pair obj)
pub fn op_set_car(it: &mut Interp) -> EvalResult<()> {
    let obj = it.vals.pop()?;
    let pair = it.vals.pop()?;
    it.set_car(pair, obj)?;
    it.vals.push(pair)
}

/// (SET-CDR! pair obj)
pub fn op_set_cdr(it: &mut Interp) -> EvalResult<()> {
    let obj = it.vals.pop()?;
    let pair = it.vals.pop()?;
    it.set_cdr(pair, obj)?;
    it.vals.push(pair)
}

/// (ASSOC key a-list)
pub fn op_assoc(it: &mut Interp) -> EvalResult<()> {
    let alist = it.vals.pop()?;
    let key = it.vals.pop()?;
    let found = it.assoc_by(key, alist, Interp::equal_cells);
    it.vals.push(found)
}

/// (ASSQ key a-list)
pub fn op_assq(it: &mut Interp) -> EvalResult<()> {
    let alist = it.vals.pop()?;
    let key = it.vals.pop()?;
    let found = it.assoc_by(key, alist, Interp::eq_cells);
    it.vals.push(found)
}

/// (ASSV key a-list)
pub fn op_assv(it: &mut Interp) -> EvalResult<()> {
    let alist = it.vals.pop()?;
    let key = it.vals.pop()?;
    let found = it.assoc_by(key, alist, Interp::eqv_cells);
    it.vals.push(found)
}

/// (MEMBER key list)
pub fn op_member(it: &mut Interp) -> EvalResult<()> {
    let list = it.vals.pop()?;
    let key = it.vals.pop()?;
    let found = it.member_by(key, list, Interp::equal_cells);
    it.vals.push(found)
}

/// (MEMQ key list)
pub fn op_memq(it: &mut Interp) -> EvalResult<()> {
    let list = it.vals.pop()?;
    let key = it.vals.pop()?;
    let found = it.member_by(key, list, Interp::eq_cells);
    it.vals.push(found)
}

/// (MEMV key list)
pub fn op_memv(it: &mut Interp) -> EvalResult<()> {
    let list = it.vals.pop()?;
    let key = it.vals.pop()?;
    let found = it.member_by(key, list, Interp::eqv_cells);
    it.vals.push(found)
}

/// (LIST obj ...)
pub fn op_list(it: &mut Interp) -> EvalResult<()> {
    let l = it.gather_vals()?;
    it.vals.push(l)
}

/// (LENGTH list)
pub fn op_length(it: &mut Interp) -> EvalResult<()> {
    let l = it.vals.pop()?;
    let n = it.list_len(l) as i64;
    let cell = it.int(n);
    it.vals.push(cell)
}

/// (REVERSE list) - copies, then reverses the copy in place.
pub fn op_reverse(it: &mut Interp) -> EvalResult<()> {
    let rm = it.reg_mark();
    let l = it.vals.pop()?;
    it.reg_push(l);
    let copy = it.tree_copy(l);
    let rev = it.reverse_in_place(copy);
    it.vals.push(rev)?;
    it.reg_release(rm);
    Ok(())
}

/// (APPEND list1 list2 ...) - copies every list's spine except the last,
/// which is attached by reference.
pub fn op_append(it: &mut Interp) -> EvalResult<()> {
    let rm = it.reg_mark();
    let lists = it.gather_vals()?;
    let lists_slot = it.reg_push(lists);
    let head_slot = it.reg_push(it.nil);
    let tail_slot = it.reg_push(it.nil);

    loop {
        let lists = it.reg(lists_slot);
        if !it.is_pair(lists) {
            break;
        }
        let arg = it.car(lists);
        let rest = it.cdr(lists);
        it.set_reg(lists_slot, rest);

        if !it.is_pair(rest) {
            // Last argument: splice by reference.
            if it.is_nil(it.reg(head_slot)) {
                it.set_reg(head_slot, arg);
            } else {
                let tail = it.reg(tail_slot);
                it.set_cdr(tail, arg)?;
            }
            break;
        }

        if it.is_nil(arg) {
            continue;
        }
        if !it.is_pair(arg) {
            return Err(SchemeError::Runtime(format!(
                "APPEND: Requires lists: {}",
                it.write_string(arg)
            )));
        }

        let mut curr = arg;
        while it.is_pair(curr) {
            let elem = it.car(curr);
            let link = it.cons(elem, it.nil);
            if it.is_nil(it.reg(head_slot)) {
                it.set_reg(head_slot, link);
            } else {
                let tail = it.reg(tail_slot);
                it.set_cdr(tail, link)?;
            }
            it.set_reg(tail_slot, link);
            curr = it.cdr(curr);
        }
    }

    let result = it.reg(head_slot);
    it.vals.push(result)?;
    it.reg_release(rm);
    Ok(())
}

/// (TREE-COPY obj)
pub fn op_tree_copy(it: &mut Interp) -> EvalResult<()> {
    let rm = it.reg_mark();
    let t = it.vals.pop()?;
    it.reg_push(t);
    let copy = it.tree_copy(t);
    it.vals.push(copy)?;
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
    fn test_car_cdr_cons() {
        assert_eq!(eval_one("(car '(1 2))"), "1");
        assert_eq!(eval_one("(cdr '(1 2))"), "(2)");
        assert_eq!(eval_one("(cons 1 '(2))"), "(1 2)");
        assert_eq!(eval_one("(cons 1 2)"), "(1 . 2)");
        // Tolerant car/cdr of ().
        assert_eq!(eval_one("(car '())"), "()");
    }

    #[test]
    fn test_mutators() {
        assert_eq!(eval_one("(define p (cons 1 2)) (set-car! p 9) p"), "(9 . 2)");
        assert_eq!(eval_one("(define q (cons 1 2)) (set-cdr! q '(3)) q"), "(1 3)");
    }

    #[test]
    fn test_assoc_family() {
        assert_eq!(eval_one("(assoc 'b '((a 1) (b 2)))"), "(B 2)");
        assert_eq!(eval_one("(assq 'c '((a 1) (b 2)))"), "#F");
        assert_eq!(eval_one("(assv 2 '((1 one) (2 two)))"), "(2 TWO)");
    }

    #[test]
    fn test_member_family() {
        assert_eq!(eval_one("(member '(1) '((0) (1) (2)))"), "((1) (2))");
        assert_eq!(eval_one("(memq 'b '(a b c))"), "(B C)");
        assert_eq!(eval_one("(memv 2 '(1 2 3))"), "(2 3)");
        assert_eq!(eval_one("(memq 'z '(a b))"), "#F");
    }

    #[test]
    fn test_list_length_reverse() {
        assert_eq!(eval_one("(list 1 2 3)"), "(1 2 3)");
        assert_eq!(eval_one("(length '(a b c))"), "3");
        assert_eq!(eval_one("(length '())"), "0");
        assert_eq!(eval_one("(reverse '(1 2 3))"), "(3 2 1)");
    }

    #[test]
    fn test_reverse_does_not_mutate_source() {
        assert_eq!(eval_one("(define l '(1 2 3)) (reverse l) l"), "(1 2 3)");
    }

    #[test]
    fn test_append() {
        assert_eq!(eval_one("(append '(1 2) '(3 4))"), "(1 2 3 4)");
        assert_eq!(eval_one("(append '() '(1))"), "(1)");
        assert_eq!(eval_one("(append '(1) '() '(2) '(3 4))"), "(1 2 3 4)");
    }

    #[test]
    fn test_append_shares_last_list() {
        assert_eq!(
            eval_one("(define t '(3 4)) (define r (append '(1 2) t)) (set-car! t 9) r"),
            "(1 2 9 4)"
        );
    }

    #[test]
    fn test_tree_copy_is_deep() {
        assert_eq!(
            eval_one("(define l '((1 2) 3)) (define c (tree-copy l)) (set-car! (car l) 9) c"),
            "((1 2) 3)"
        );
    }
}
