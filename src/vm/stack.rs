//! Operand stack for the VM
//!
//! Each interpreter activation owns one stack shared by all the JavaScript
//! frames it runs; a frame addresses its part through a base index.

use crate::value::JSValue;

/// Value stack for bytecode execution
pub struct Stack {
    values: Vec<JSValue>,
}

impl Stack {
    /// Create a new stack with the given capacity
    pub fn new(capacity: usize) -> Self {
        Stack {
            values: Vec::with_capacity(capacity),
        }
    }

    /// Push a value onto the stack
    #[inline]
    pub fn push(&mut self, value: JSValue) {
        self.values.push(value);
    }

    /// Pop a value from the stack
    #[inline]
    pub fn pop(&mut self) -> Option<JSValue> {
        self.values.pop()
    }

    /// Peek at a value at offset from top (0 = top)
    #[inline]
    pub fn peek(&self, offset: usize) -> Option<&JSValue> {
        let len = self.values.len();
        if offset < len {
            Some(&self.values[len - 1 - offset])
        } else {
            None
        }
    }

    /// Pop the top `n` values, oldest first
    pub fn pop_n(&mut self, n: usize) -> Option<Vec<JSValue>> {
        let len = self.values.len();
        if n > len {
            return None;
        }
        Some(self.values.split_off(len - n))
    }

    /// Swap the two entries at the given offsets from the top
    pub fn swap(&mut self, a: usize, b: usize) -> bool {
        let len = self.values.len();
        if a >= len || b >= len {
            return false;
        }
        self.values.swap(len - 1 - a, len - 1 - b);
        true
    }

    /// a b c d -> c a b d
    pub fn perm4(&mut self) -> bool {
        let len = self.values.len();
        if len < 4 {
            return false;
        }
        let c = self.values.remove(len - 2);
        self.values.insert(len - 4, c);
        true
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Drop everything above `len`
    #[inline]
    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(stack: &mut Stack) -> Vec<i32> {
        let n = stack.len();
        stack
            .pop_n(n)
            .unwrap()
            .into_iter()
            .map(|v| match v {
                JSValue::Int(i) => i,
                _ => -1,
            })
            .collect()
    }

    #[test]
    fn test_push_pop() {
        let mut stack = Stack::new(8);
        stack.push(JSValue::Int(1));
        stack.push(JSValue::Int(2));
        assert_eq!(stack.len(), 2);
        assert!(matches!(stack.peek(0), Some(JSValue::Int(2))));
        assert!(matches!(stack.peek(1), Some(JSValue::Int(1))));
        assert!(stack.peek(2).is_none());
        assert!(matches!(stack.pop(), Some(JSValue::Int(2))));
        assert!(matches!(stack.pop(), Some(JSValue::Int(1))));
        assert!(stack.pop().is_none());
    }

    #[test]
    fn test_pop_n() {
        let mut stack = Stack::new(8);
        for i in 0..4 {
            stack.push(JSValue::Int(i));
        }
        let top = stack.pop_n(2).unwrap();
        assert!(matches!(top[0], JSValue::Int(2)));
        assert!(matches!(top[1], JSValue::Int(3)));
        assert!(stack.pop_n(3).is_none());
    }

    #[test]
    fn test_permutations() {
        let mut stack = Stack::new(8);
        for i in 1..=3 {
            stack.push(JSValue::Int(i));
        }
        // a b c -> b a c
        assert!(stack.swap(1, 2));
        assert_eq!(ints(&mut stack), vec![2, 1, 3]);

        for i in 1..=4 {
            stack.push(JSValue::Int(i));
        }
        assert!(stack.perm4());
        assert_eq!(ints(&mut stack), vec![3, 1, 2, 4]);
    }
}
