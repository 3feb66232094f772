//! Serialization of the emitted unit into Jasmin assembly text.
//!
//! The listing opens with the class preamble: the class header, three
//! static fields, a class initializer that builds a buffered UTF-8 scanner
//! over stdin pinned to the US locale, the default constructor, and the two
//! read helpers the generated code invokes. Each parsed body follows as one
//! method with its declared stack and locals limits.

use super::{CodeGen, CodeItem};
use crate::codegen::array_type_name;
use std::fmt::Write as _;

impl CodeGen {
    /// Serialize the preamble and every body, in encounter order, into one
    /// assembly listing.
    pub fn make_listing(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        self.write_preamble(&mut out)?;
        for body in self.bodies() {
            self.write_body(&mut out, body)?;
        }
        Ok(out)
    }

    fn write_body(&self, out: &mut String, body: &super::Body) -> std::fmt::Result {
        writeln!(out, ".method public static {}{}", body.name(), body.descriptor)?;
        writeln!(out, "  .limit stack {}", body.max_stack_depth())?;
        writeln!(out, "  .limit locals {}", body.variables_width())?;

        let mut items = body.code().iter().peekable();
        while let Some(item) = items.next() {
            match item {
                CodeItem::Label(label) => writeln!(out, "L{}:", label)?,
                CodeItem::Instr(op) => {
                    write!(out, "  {}", op.mnemonic())?;
                    if op.has_operand() {
                        if let Some(operand) = items.next() {
                            write_operand(out, operand)?;
                        }
                    }
                    writeln!(out)?;
                }
                // Operands are consumed with their opcode above.
                _ => {}
            }
        }

        // A trailing label may not dangle before `.end method`.
        if matches!(body.code().last(), Some(CodeItem::Label(_))) {
            writeln!(out, "  nop")?;
        }
        writeln!(out, ".end method")?;
        writeln!(out)?;
        Ok(())
    }

    fn write_preamble(&self, out: &mut String) -> std::fmt::Result {
        let class = self.class_name();
        writeln!(out, ".class public {}", class)?;
        writeln!(out, ".super java/lang/Object")?;
        writeln!(out)?;
        writeln!(out, ".field private static final charsetName Ljava/lang/String;")?;
        writeln!(out, ".field private static final usLocale Ljava/util/Locale;")?;
        writeln!(out, ".field private static scanner Ljava/util/Scanner;")?;
        writeln!(out)?;

        // Class initializer: charset name, US locale, and a buffered UTF-8
        // scanner over standard input.
        writeln!(out, ".method static <clinit>()V")?;
        writeln!(out, "  .limit stack 8")?;
        writeln!(out, "  .limit locals 0")?;
        writeln!(out, "  ldc \"UTF-8\"")?;
        writeln!(out, "  putstatic {}/charsetName Ljava/lang/String;", class)?;
        writeln!(out, "  new java/util/Locale")?;
        writeln!(out, "  dup")?;
        writeln!(out, "  ldc \"en\"")?;
        writeln!(out, "  ldc \"US\"")?;
        writeln!(
            out,
            "  invokespecial java/util/Locale/<init>(Ljava/lang/String;Ljava/lang/String;)V"
        )?;
        writeln!(out, "  putstatic {}/usLocale Ljava/util/Locale;", class)?;
        writeln!(out, "  new java/util/Scanner")?;
        writeln!(out, "  dup")?;
        writeln!(out, "  new java/io/BufferedReader")?;
        writeln!(out, "  dup")?;
        writeln!(out, "  new java/io/InputStreamReader")?;
        writeln!(out, "  dup")?;
        writeln!(out, "  getstatic java/lang/System/in Ljava/io/InputStream;")?;
        writeln!(out, "  getstatic {}/charsetName Ljava/lang/String;", class)?;
        writeln!(
            out,
            "  invokespecial java/io/InputStreamReader/<init>(Ljava/io/InputStream;Ljava/lang/String;)V"
        )?;
        writeln!(
            out,
            "  invokespecial java/io/BufferedReader/<init>(Ljava/io/Reader;)V"
        )?;
        writeln!(
            out,
            "  invokespecial java/util/Scanner/<init>(Ljava/lang/Readable;)V"
        )?;
        writeln!(out, "  putstatic {}/scanner Ljava/util/Scanner;", class)?;
        writeln!(out, "  getstatic {}/scanner Ljava/util/Scanner;", class)?;
        writeln!(out, "  getstatic {}/usLocale Ljava/util/Locale;", class)?;
        writeln!(
            out,
            "  invokevirtual java/util/Scanner/useLocale(Ljava/util/Locale;)Ljava/util/Scanner;"
        )?;
        writeln!(out, "  pop")?;
        writeln!(out, "  return")?;
        writeln!(out, ".end method")?;
        writeln!(out)?;

        writeln!(out, ".method public <init>()V")?;
        writeln!(out, "  .limit stack 1")?;
        writeln!(out, "  .limit locals 1")?;
        writeln!(out, "  aload_0")?;
        writeln!(out, "  invokespecial java/lang/Object/<init>()V")?;
        writeln!(out, "  return")?;
        writeln!(out, ".end method")?;
        writeln!(out)?;

        writeln!(out, ".method private static readInt()I")?;
        writeln!(out, "  .limit stack 1")?;
        writeln!(out, "  .limit locals 0")?;
        writeln!(out, "  getstatic {}/scanner Ljava/util/Scanner;", class)?;
        writeln!(out, "  invokevirtual java/util/Scanner/nextInt()I")?;
        writeln!(out, "  ireturn")?;
        writeln!(out, ".end method")?;
        writeln!(out)?;

        writeln!(out, ".method private static readBoolean()Z")?;
        writeln!(out, "  .limit stack 1")?;
        writeln!(out, "  .limit locals 0")?;
        writeln!(out, "  getstatic {}/scanner Ljava/util/Scanner;", class)?;
        writeln!(out, "  invokevirtual java/util/Scanner/nextBoolean()Z")?;
        writeln!(out, "  ireturn")?;
        writeln!(out, ".end method")?;
        writeln!(out)?;
        Ok(())
    }
}

fn write_operand(out: &mut String, operand: &CodeItem) -> std::fmt::Result {
    match operand {
        CodeItem::Int(value) => write!(out, " {}", value),
        CodeItem::ArrayType(tag) => write!(out, " {}", array_type_name(*tag)),
        CodeItem::Ref(reference) => write!(out, " {}", reference),
        CodeItem::Str(text) => write!(out, " \"{}\"", text),
        CodeItem::Target(label) => write!(out, " L{}", label),
        // Labels and instructions are not operands.
        CodeItem::Label(_) | CodeItem::Instr(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::super::{CodeGen, Opcode};
    use crate::types::BaseType;

    fn empty_main() -> CodeGen {
        let mut code = CodeGen::new();
        code.set_class_name("Empty");
        code.init_body("main", None);
        code.gen_instr(Opcode::Return);
        code.close_body(1);
        code
    }

    #[test]
    fn test_listing_has_class_preamble() {
        let listing = empty_main().make_listing().unwrap();
        assert!(listing.starts_with(".class public Empty\n.super java/lang/Object\n"));
        assert!(listing.contains(".field private static scanner Ljava/util/Scanner;"));
        assert!(listing.contains(".method static <clinit>()V"));
        assert!(listing.contains("invokevirtual java/util/Scanner/useLocale"));
        assert!(listing.contains(".method private static readInt()I"));
        assert!(listing.contains(".method private static readBoolean()Z"));
    }

    #[test]
    fn test_main_method_signature_and_limits() {
        let listing = empty_main().make_listing().unwrap();
        assert!(listing.contains(".method public static main([Ljava/lang/String;)V"));
        assert!(listing.contains("  .limit locals 1"));
        assert!(listing.contains("  return\n.end method"));
    }

    #[test]
    fn test_operands_share_the_instruction_line() {
        let mut code = CodeGen::new();
        code.set_class_name("T");
        code.init_body("main", None);
        code.gen_const(42);
        code.gen_store(1);
        code.gen_instr(Opcode::Return);
        code.close_body(2);

        let listing = code.make_listing().unwrap();
        assert!(listing.contains("  ldc 42\n"));
        assert!(listing.contains("  istore 1\n"));
    }

    #[test]
    fn test_labels_serialize_on_their_own_line() {
        let mut code = CodeGen::new();
        code.set_class_name("T");
        code.init_body("main", None);
        let label = code.get_label();
        code.gen_branch(Opcode::Goto, label);
        code.gen_label(label);
        code.gen_instr(Opcode::Return);
        code.close_body(1);

        let listing = code.make_listing().unwrap();
        assert!(listing.contains("  goto L1\n"));
        assert!(listing.contains("\nL1:\n"));
    }

    #[test]
    fn test_trailing_label_gets_nop() {
        let mut code = CodeGen::new();
        code.set_class_name("T");
        code.init_body("main", None);
        let label = code.get_label();
        code.gen_branch(Opcode::Goto, label);
        code.gen_label(label);
        code.close_body(1);

        let listing = code.make_listing().unwrap();
        assert!(listing.contains("L1:\n  nop\n.end method"));
    }

    #[test]
    fn test_newarray_operand_is_type_name() {
        let mut code = CodeGen::new();
        code.set_class_name("T");
        code.init_body("main", None);
        code.gen_const(10);
        code.gen_newarray(BaseType::Integer);
        code.gen_store_object(1);
        code.gen_const(2);
        code.gen_newarray(BaseType::Boolean);
        code.gen_store_object(2);
        code.gen_instr(Opcode::Return);
        code.close_body(3);

        let listing = code.make_listing().unwrap();
        assert!(listing.contains("  newarray int\n"));
        assert!(listing.contains("  newarray boolean\n"));
        assert!(listing.contains("  astore 1\n"));
    }

    #[test]
    fn test_string_operand_is_quoted() {
        let mut code = CodeGen::new();
        code.set_class_name("T");
        code.init_body("main", None);
        code.gen_print_string("hello");
        code.gen_instr(Opcode::Return);
        code.close_body(1);

        let listing = code.make_listing().unwrap();
        assert!(listing.contains("  ldc \"hello\"\n"));
    }
}
