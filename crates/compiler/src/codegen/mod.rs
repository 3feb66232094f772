//! Stack-machine code emitter.
//!
//! The parser drives one [`CodeGen`] for the whole compilation unit. Each
//! subroutine body accumulates a stream of tagged code items; the emitter
//! tracks the running and maximum operand-stack depth as instructions are
//! appended, and the local-variable width is recorded when the body closes.
//! After a successful parse, [`CodeGen::make_listing`] serializes the class
//! preamble and every body into one Jasmin assembly unit.
//!
//! Stack accounting applies each instruction's effect push-first: the depth
//! rises by the push count (updating the maximum), then falls by the pop
//! count. The maximum is therefore a safe bound for the `.limit stack`
//! declaration without a separate analysis pass.

mod instr;
mod serialize;

pub use instr::{array_type_name, array_type_tag, CodeItem, Opcode};

use crate::types::{BaseType, IdProp, ValType};

/// The code stream and frame accounting for one subroutine body.
#[derive(Debug)]
pub struct Body {
    name: String,
    /// Method descriptor, e.g. `(I[I)V`; the platform entry signature for
    /// the top-level `main` body.
    descriptor: String,
    code: Vec<CodeItem>,
    stack_depth: u32,
    max_stack_depth: u32,
    variables_width: u32,
}

impl Body {
    fn new(name: String, descriptor: String) -> Self {
        Body {
            name,
            descriptor,
            code: Vec::new(),
            stack_depth: 0,
            max_stack_depth: 0,
            variables_width: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_stack_depth(&self) -> u32 {
        self.max_stack_depth
    }

    pub fn variables_width(&self) -> u32 {
        self.variables_width
    }

    pub fn code(&self) -> &[CodeItem] {
        &self.code
    }
}

/// The parameter descriptor for a value type.
fn type_descriptor(t: ValType) -> &'static str {
    if t.is_array() {
        if t.is_boolean() { "[Z" } else { "[I" }
    } else {
        // Scalars travel as ints on the operand stack.
        "I"
    }
}

/// The full method descriptor for a subroutine binding.
fn method_descriptor(prop: &IdProp) -> String {
    let mut descriptor = String::from("(");
    for param in &prop.params {
        descriptor.push_str(type_descriptor(*param));
    }
    descriptor.push(')');
    match prop.typ.base() {
        BaseType::Void => descriptor.push('V'),
        _ => descriptor.push_str(type_descriptor(prop.typ.return_type())),
    }
    descriptor
}

/// The code emitter for one compilation unit.
#[derive(Debug)]
pub struct CodeGen {
    class_name: String,
    bodies: Vec<Body>,
    current: Option<Body>,
    next_label: u32,
}

impl CodeGen {
    pub fn new() -> Self {
        CodeGen {
            class_name: String::new(),
            bodies: Vec::new(),
            current: None,
            next_label: 1,
        }
    }

    pub fn set_class_name(&mut self, name: &str) {
        self.class_name = name.to_string();
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Completed bodies, in encounter order.
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    /// Open a fresh body. `prop` is `None` for the top-level `main` body.
    pub fn init_body(&mut self, name: &str, prop: Option<&IdProp>) {
        let descriptor = match prop {
            Some(prop) => method_descriptor(prop),
            None => String::from("([Ljava/lang/String;)V"),
        };
        self.current = Some(Body::new(name.to_string(), descriptor));
    }

    /// Close the current body, recording its local-variable width, and
    /// append it to the body list.
    pub fn close_body(&mut self, variables_width: u32) {
        if let Some(mut body) = self.current.take() {
            body.variables_width = variables_width;
            self.bodies.push(body);
        }
    }

    fn body(&mut self) -> &mut Body {
        // The parser opens a body before emitting into it.
        self.current.as_mut().unwrap_or_else(|| unreachable!("no open body"))
    }

    /// Apply a stack effect: push first (bounding the maximum), then pop.
    fn apply_effect(&mut self, pops: u32, pushes: u32) {
        let body = self.body();
        body.stack_depth += pushes;
        if body.stack_depth > body.max_stack_depth {
            body.max_stack_depth = body.stack_depth;
        }
        debug_assert!(body.stack_depth >= pops, "operand stack underflow");
        body.stack_depth = body.stack_depth.saturating_sub(pops);
    }

    fn push_instr(&mut self, op: Opcode) {
        self.body().code.push(CodeItem::Instr(op));
        if let Some((pops, pushes)) = op.stack_effect() {
            self.apply_effect(pops, pushes);
        }
    }

    /// Emit an operand-free instruction.
    pub fn gen_instr(&mut self, op: Opcode) {
        debug_assert!(!op.has_operand());
        self.push_instr(op);
    }

    /// Allocate a fresh label id from the per-program counter.
    pub fn get_label(&mut self) -> u32 {
        let label = self.next_label;
        self.next_label += 1;
        label
    }

    /// Place a label in the code stream.
    pub fn gen_label(&mut self, label: u32) {
        self.body().code.push(CodeItem::Label(label));
    }

    /// Load an integer constant.
    pub fn gen_const(&mut self, value: i32) {
        self.push_instr(Opcode::Ldc);
        self.body().code.push(CodeItem::Int(value));
    }

    /// Load a scalar local.
    pub fn gen_load(&mut self, slot: u32) {
        self.push_instr(Opcode::Iload);
        self.body().code.push(CodeItem::Int(slot as i32));
    }

    /// Store a scalar local.
    pub fn gen_store(&mut self, slot: u32) {
        self.push_instr(Opcode::Istore);
        self.body().code.push(CodeItem::Int(slot as i32));
    }

    /// Load an array-reference local.
    pub fn gen_load_object(&mut self, slot: u32) {
        self.push_instr(Opcode::Aload);
        self.body().code.push(CodeItem::Int(slot as i32));
    }

    /// Store an array-reference local.
    pub fn gen_store_object(&mut self, slot: u32) {
        self.push_instr(Opcode::Astore);
        self.body().code.push(CodeItem::Int(slot as i32));
    }

    /// Allocate a one-dimensional array of `base`; the length is on the
    /// stack.
    pub fn gen_newarray(&mut self, base: BaseType) {
        self.push_instr(Opcode::Newarray);
        let tag = array_type_tag(base);
        self.body().code.push(CodeItem::ArrayType(tag));
    }

    /// Load an element from an array of `base`.
    pub fn gen_array_load(&mut self, base: BaseType) {
        let op = match base {
            BaseType::Boolean => Opcode::Baload,
            _ => Opcode::Iaload,
        };
        self.push_instr(op);
    }

    /// Store an element into an array of `base`.
    pub fn gen_array_store(&mut self, base: BaseType) {
        let op = match base {
            BaseType::Boolean => Opcode::Bastore,
            _ => Opcode::Iastore,
        };
        self.push_instr(op);
    }

    /// Emit a branch to `target`.
    pub fn gen_branch(&mut self, op: Opcode, target: u32) {
        debug_assert!(matches!(
            op,
            Opcode::Goto
                | Opcode::Ifeq
                | Opcode::IfIcmpeq
                | Opcode::IfIcmpne
                | Opcode::IfIcmplt
                | Opcode::IfIcmple
                | Opcode::IfIcmpgt
                | Opcode::IfIcmpge
        ));
        self.push_instr(op);
        self.body().code.push(CodeItem::Target(target));
    }

    /// Materialize a comparison as 0 or 1 on the stack: branch on the
    /// condition, push 0 and skip, or land on the branch target and push 1.
    pub fn gen_cmp(&mut self, op: Opcode) {
        let yes = self.get_label();
        let done = self.get_label();
        self.gen_branch(op, yes);
        self.gen_const(0);
        self.gen_branch(Opcode::Goto, done);
        self.gen_label(yes);
        self.gen_const(1);
        self.gen_label(done);
    }

    /// Invoke a subroutine of this compilation unit. The stack effect is
    /// taken from the callee's signature.
    pub fn gen_call(&mut self, name: &str, prop: &IdProp) {
        let descriptor = method_descriptor(prop);
        let reference = format!("{}/{}{}", self.class_name, name, descriptor);
        self.body().code.push(CodeItem::Instr(Opcode::Invokestatic));
        self.body().code.push(CodeItem::Ref(reference));
        let pushes = u32::from(prop.typ.base() != BaseType::Void);
        self.apply_effect(prop.nparams() as u32, pushes);
    }

    /// Print the scalar on top of the stack. Loads the stdout reference and
    /// swaps it under the value, then selects the print method by type.
    pub fn gen_print(&mut self, base: BaseType) {
        self.push_instr(Opcode::Getstatic);
        self.body()
            .code
            .push(CodeItem::Ref("java/lang/System/out Ljava/io/PrintStream;".to_string()));
        self.gen_instr(Opcode::Swap);
        let descriptor = match base {
            BaseType::Boolean => "(Z)V",
            _ => "(I)V",
        };
        self.body().code.push(CodeItem::Instr(Opcode::Invokevirtual));
        self.body()
            .code
            .push(CodeItem::Ref(format!("java/io/PrintStream/print{}", descriptor)));
        self.apply_effect(2, 0);
    }

    /// Print a string literal.
    pub fn gen_print_string(&mut self, text: &str) {
        self.push_instr(Opcode::Getstatic);
        self.body()
            .code
            .push(CodeItem::Ref("java/lang/System/out Ljava/io/PrintStream;".to_string()));
        self.push_instr(Opcode::Ldc);
        self.body().code.push(CodeItem::Str(text.to_string()));
        self.body().code.push(CodeItem::Instr(Opcode::Invokevirtual));
        self.body()
            .code
            .push(CodeItem::Ref("java/io/PrintStream/print(Ljava/lang/String;)V".to_string()));
        self.apply_effect(2, 0);
    }

    /// Read a scalar of `base` from standard input via the read helper
    /// synthesized in the class preamble.
    pub fn gen_read(&mut self, base: BaseType) {
        let reference = match base {
            BaseType::Boolean => format!("{}/readBoolean()Z", self.class_name),
            _ => format!("{}/readInt()I", self.class_name),
        };
        self.body().code.push(CodeItem::Instr(Opcode::Invokestatic));
        self.body().code.push(CodeItem::Ref(reference));
        self.apply_effect(0, 1);
    }
}

impl Default for CodeGen {
    fn default() -> Self {
        Self::new()
    }
}
