//! Register/variable store
//!
//! Owns every typed storage slot: the fixed register bank, global variables
//! and the local scope of the active call. Names resolve locals first, then
//! registers, then globals. Every operation either succeeds completely or
//! leaves the store exactly as it was.

use std::collections::HashMap;

use crate::config::RegisterSpec;
use crate::error::{Fault, FaultResult};
use crate::types::DataType;
use crate::value::{self, ArithOp, CompareOp, Value};

/// A single typed storage slot
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub ty: DataType,
    pub value: Value,
    pub constant: bool,
    /// Constants accept exactly one write while this is false
    pub initialized: bool,
}

impl Binding {
    pub fn new(ty: DataType) -> Self {
        Self {
            ty,
            value: Value::zero(ty),
            constant: false,
            initialized: false,
        }
    }

    fn check_writable(&self, name: &str) -> FaultResult<()> {
        if self.constant && self.initialized {
            return Err(Fault::ConstViolation(name.to_string()));
        }
        Ok(())
    }

    fn commit(&mut self, value: Value) {
        self.value = value;
        self.initialized = true;
    }
}

/// Variables declared inside one call
pub type Scope = HashMap<String, Binding>;

/// Fixed-width register of the bank
#[derive(Debug, Clone)]
struct Register {
    name: String,
    binding: Binding,
}

/// Typed register/variable store
#[derive(Debug, Clone)]
pub struct Store {
    registers: Vec<Register>,
    register_index: HashMap<String, usize>,
    globals: HashMap<String, Binding>,
    locals: Option<Scope>,
}

impl Default for Store {
    fn default() -> Self {
        Self::with_registers(&RegisterSpec::default_bank())
    }
}

impl Store {
    /// Store with the default register bank
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with a custom register bank; names are expected to be unique
    pub fn with_registers(bank: &[RegisterSpec]) -> Self {
        let registers: Vec<Register> = bank
            .iter()
            .map(|spec| Register {
                name: spec.name.to_ascii_lowercase(),
                binding: Binding::new(spec.width.int_type()),
            })
            .collect();
        let register_index = registers
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.clone(), i))
            .collect();
        Self {
            registers,
            register_index,
            globals: HashMap::new(),
            locals: None,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LOOKUP
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn is_register(&self, name: &str) -> bool {
        self.register_index.contains_key(name)
    }

    fn binding(&self, name: &str) -> FaultResult<&Binding> {
        if let Some(b) = self.locals.as_ref().and_then(|scope| scope.get(name)) {
            return Ok(b);
        }
        if let Some(&i) = self.register_index.get(name) {
            return Ok(&self.registers[i].binding);
        }
        self.globals
            .get(name)
            .ok_or_else(|| Fault::UnknownName(name.to_string()))
    }

    fn binding_mut(&mut self, name: &str) -> FaultResult<&mut Binding> {
        let local = self.locals.as_ref().is_some_and(|scope| scope.contains_key(name));
        if local {
            return self
                .locals
                .as_mut()
                .and_then(|scope| scope.get_mut(name))
                .ok_or_else(|| Fault::UnknownName(name.to_string()));
        }
        if let Some(&i) = self.register_index.get(name) {
            return Ok(&mut self.registers[i].binding);
        }
        self.globals
            .get_mut(name)
            .ok_or_else(|| Fault::UnknownName(name.to_string()))
    }

    /// Declared type of a bound name
    pub fn type_of(&self, name: &str) -> FaultResult<DataType> {
        self.binding(name).map(|b| b.ty)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.binding(name).is_ok()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Create a binding in the active scope (locals inside a call, else globals)
    pub fn declare(
        &mut self,
        name: &str,
        ty: DataType,
        constant: bool,
        initial: Option<Value>,
    ) -> FaultResult<DataType> {
        if self.is_register(name) {
            return Err(Fault::DuplicateDeclaration(name.to_string()));
        }
        let mut binding = Binding::new(ty);
        binding.constant = constant;
        if let Some(v) = initial {
            binding.commit(value::coerce(v, ty)?);
        }

        let scope = match self.locals.as_mut() {
            Some(scope) => scope,
            None => &mut self.globals,
        };
        if scope.contains_key(name) {
            return Err(Fault::DuplicateDeclaration(name.to_string()));
        }
        scope.insert(name.to_string(), binding);
        Ok(ty)
    }

    /// Current value of `name`
    pub fn read(&self, name: &str) -> FaultResult<Value> {
        self.binding(name).map(|b| b.value.clone())
    }

    /// Store `value` into `name`, converting it to the declared type
    pub fn write(&mut self, name: &str, value: Value) -> FaultResult<DataType> {
        let binding = self.binding_mut(name)?;
        binding.check_writable(name)?;
        let converted = value::coerce(value, binding.ty)?;
        binding.commit(converted);
        Ok(binding.ty)
    }

    /// `dest <- dest <op> src`, computed in full precision and masked once
    pub fn arithmetic(&mut self, op: ArithOp, dest: &str, src: Option<&Value>) -> FaultResult<DataType> {
        let binding = self.binding_mut(dest)?;
        binding.check_writable(dest)?;
        let result = value::apply(op, binding.ty, &binding.value, src)?;
        binding.commit(result);
        Ok(binding.ty)
    }

    /// Evaluate a comparison between two resolved operands
    pub fn compare(&self, op: CompareOp, left: &Value, right: &Value) -> FaultResult<bool> {
        value::compare(op, left, right)
    }

    /// Remove a dynamic binding
    pub fn free(&mut self, name: &str) -> FaultResult<()> {
        if let Some(scope) = self.locals.as_mut() {
            if scope.remove(name).is_some() {
                return Ok(());
            }
        }
        if self.is_register(name) {
            return Err(Fault::FixedRegister(name.to_string()));
        }
        self.globals
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Fault::UnknownName(name.to_string()))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SCOPES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Install `scope` as the active local scope, returning the previous one
    pub fn replace_locals(&mut self, scope: Option<Scope>) -> Option<Scope> {
        std::mem::replace(&mut self.locals, scope)
    }

    pub fn in_local_scope(&self) -> bool {
        self.locals.is_some()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INSPECTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Register names and values, in bank order
    pub fn registers(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.registers
            .iter()
            .map(|r| (r.name.as_str(), &r.binding.value))
    }

    /// Number of live global variables
    pub fn global_count(&self) -> usize {
        self.globals.len()
    }

    /// Zero every register and drop all variables
    pub fn reset(&mut self) {
        for r in &mut self.registers {
            r.binding = Binding::new(r.binding.ty);
        }
        self.globals.clear();
        self.locals = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IntLit;

    fn int(v: i128) -> Value {
        Value::Int(IntLit::from_i128(v))
    }

    #[test]
    fn test_default_bank() {
        let store = Store::new();
        assert_eq!(store.type_of("r1").unwrap(), DataType::I16);
        assert_eq!(store.type_of("r7").unwrap(), DataType::I32);
        assert_eq!(store.type_of("r13").unwrap(), DataType::I64);
        assert_eq!(store.type_of("r16").unwrap(), DataType::I128);
        assert_eq!(store.registers().count(), 16);
        assert!(store.registers().all(|(_, v)| *v == int(0)));
    }

    #[test]
    fn test_write_read_masks_per_width() {
        let mut store = Store::new();
        for (reg, bits) in [("r1", 16u32), ("r7", 32), ("r11", 64)] {
            store.write(reg, int(-1)).unwrap();
            let expected = (1u128 << bits) - 1;
            assert_eq!(store.read(reg).unwrap(), Value::Int(IntLit::from_unsigned(expected)));
        }
        store.write("r14", int(-1)).unwrap();
        assert_eq!(store.read("r14").unwrap(), Value::Int(IntLit::from_unsigned(u128::MAX)));
    }

    #[test]
    fn test_declare_duplicates() {
        let mut store = Store::new();
        store.declare("x", DataType::I32, false, None).unwrap();
        assert_eq!(
            store.declare("x", DataType::I64, false, None),
            Err(Fault::DuplicateDeclaration("x".into()))
        );
        assert_eq!(
            store.declare("r1", DataType::I16, false, None),
            Err(Fault::DuplicateDeclaration("r1".into()))
        );
        // type fixed at declaration
        assert_eq!(store.type_of("x").unwrap(), DataType::I32);
    }

    #[test]
    fn test_constants_are_write_once() {
        let mut store = Store::new();
        store.declare("pi", DataType::F64, true, Some(Value::F64(2.5))).unwrap();
        assert_eq!(store.write("pi", Value::F64(3.0)), Err(Fault::ConstViolation("pi".into())));
        assert_eq!(
            store.arithmetic(ArithOp::Inc, "pi", None),
            Err(Fault::ConstViolation("pi".into()))
        );
        assert_eq!(store.read("pi").unwrap(), Value::F64(2.5));

        store.declare("late", DataType::I32, true, None).unwrap();
        store.write("late", int(7)).unwrap();
        assert!(matches!(store.write("late", int(8)), Err(Fault::ConstViolation(_))));
        assert_eq!(store.read("late").unwrap(), int(7));
    }

    #[test]
    fn test_division_by_zero_leaves_dest() {
        let mut store = Store::new();
        store.write("r1", int(42)).unwrap();
        assert_eq!(
            store.arithmetic(ArithOp::Div, "r1", Some(&int(0))),
            Err(Fault::DivisionByZero)
        );
        assert_eq!(store.read("r1").unwrap(), int(42));
    }

    #[test]
    fn test_free() {
        let mut store = Store::new();
        store.declare("tmp", DataType::Str, false, Some(Value::Str("x".into()))).unwrap();
        store.free("tmp").unwrap();
        assert_eq!(store.read("tmp"), Err(Fault::UnknownName("tmp".into())));
        assert_eq!(store.free("tmp"), Err(Fault::UnknownName("tmp".into())));
        assert_eq!(store.free("r2"), Err(Fault::FixedRegister("r2".into())));
    }

    #[test]
    fn test_local_scope_shadows_globals() {
        let mut store = Store::new();
        store.declare("n", DataType::I32, false, Some(int(1))).unwrap();

        let saved = store.replace_locals(Some(Scope::new()));
        assert!(saved.is_none());
        store.declare("n", DataType::I16, false, Some(int(99))).unwrap();
        assert_eq!(store.read("n").unwrap(), int(99));
        assert_eq!(store.type_of("n").unwrap(), DataType::I16);

        store.replace_locals(saved);
        assert_eq!(store.read("n").unwrap(), int(1));
        assert!(!store.in_local_scope());
    }

    #[test]
    fn test_reset() {
        let mut store = Store::new();
        store.write("r3", int(5)).unwrap();
        store.declare("g", DataType::I64, false, None).unwrap();
        store.reset();
        assert_eq!(store.read("r3").unwrap(), int(0));
        assert_eq!(store.global_count(), 0);
    }
}
