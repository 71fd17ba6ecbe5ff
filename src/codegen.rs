use std::collections::HashMap;
use std::mem;

use inkwell::{
    builder::Builder,
    context::Context,
    module::Module,
    types::BasicMetadataTypeEnum,
    values::{AnyValue, BasicMetadataValueEnum, FloatValue, FunctionValue},
    FloatPredicate,
};
use log::{debug, warn};

use crate::ast::{ASTNode, Expression, Function, Prototype, Visitor};

/// Name of the function wrapping a bare top-level expression. Identifiers
/// never contain `_`, so no user function can take it.
pub const ANONYMOUS_NAME: &str = "__anon_expr";

const STAGING: &str = "staging";

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum CodegenError {
    #[error("unknown variable name '{0}'")]
    UnknownVariable(String),
    #[error("invalid binary operator '{0}'")]
    UnknownOperator(char),
    #[error("unknown function referenced '{0}'")]
    UnknownFunction(String),
    #[error("incorrect # arguments passed to '{0}': expected {1}, found {2}")]
    InvalidCall(String, usize, usize),
    #[error("function cannot be redefined: '{0}'")]
    Redefinition(String),
    #[error("argument name is not the same as the declaration: '{function}' declares '{declared}', found '{found}'")]
    ArgumentMismatch {
        function: String,
        declared: String,
        found: String,
    },
    #[error("'{function}' is declared with {declared} arguments, found {found}")]
    ConflictingDeclaration {
        function: String,
        declared: usize,
        found: usize,
    },
    #[error("failed to verify function '{0}'")]
    InvalidFunction(String),
    #[error("failed to publish '{0}': {1}")]
    Link(String, String),
}

/// A bare expression lowered into its own module, kept out of the session
/// module so it can be evaluated and dropped.
pub struct TopLevel<'ctx> {
    pub module: Module<'ctx>,
    pub function: FunctionValue<'ctx>,
}

/// What one top-level unit lowered to.
pub enum Lowered<'ctx> {
    Declaration(FunctionValue<'ctx>),
    Definition(FunctionValue<'ctx>),
    Expression(TopLevel<'ctx>),
}

impl<'ctx> Lowered<'ctx> {
    pub fn function(&self) -> FunctionValue<'ctx> {
        match self {
            Lowered::Declaration(function) | Lowered::Definition(function) => *function,
            Lowered::Expression(toplevel) => toplevel.function,
        }
    }

    /// LLVM assembly for the unit. An `extern` naming a function that is
    /// already defined renders as the declaration only.
    pub fn render(&self) -> String {
        let function = self.function();
        match self {
            Lowered::Declaration(_) if function.count_basic_blocks() > 0 => format!(
                "declare double @{}({})",
                function.get_name().to_string_lossy(),
                vec!["double"; function.count_params() as usize].join(", ")
            ),
            _ => function.print_to_string().to_string().trim().to_string(),
        }
    }
}

/// Lowers parsed units into an LLVM module.
///
/// Every function body is built in a fresh staging module. A definition is
/// linked into `module` only after it verifies, so a body that fails to
/// lower leaves the session module untouched.
pub struct Codegen<'ctx> {
    pub context: &'ctx Context,
    pub module: Module<'ctx>,
    builder: Builder<'ctx>,
    named_values: HashMap<String, FloatValue<'ctx>>,
    staging: Module<'ctx>,
}

impl<'ctx> Codegen<'ctx> {
    pub fn new(context: &'ctx Context, module_name: &str) -> Codegen<'ctx> {
        Codegen {
            context,
            module: context.create_module(module_name),
            builder: context.create_builder(),
            named_values: HashMap::new(),
            staging: context.create_module(STAGING),
        }
    }

    pub fn codegen(&mut self, node: &ASTNode) -> Result<Lowered<'ctx>, CodegenError> {
        node.accept(self)
    }

    fn compile_proto(&self, module: &Module<'ctx>, name: &str, args: &[String]) -> FunctionValue<'ctx> {
        let args_types = std::iter::repeat(self.context.f64_type())
            .take(args.len())
            .map(|f| f.into())
            .collect::<Vec<BasicMetadataTypeEnum>>();

        let fn_type = self.context.f64_type().fn_type(&args_types, false);
        let fn_val = module.add_function(name, fn_type, None);

        // LLVM suffixes repeated names, so `f(a, a)` gets `%a` and `%a1`
        for (arg, name) in fn_val.get_param_iter().zip(args) {
            arg.into_float_value().set_name(name);
        }

        fn_val
    }

    /// Finds a callee for the body being built, importing a declaration of
    /// a session function into the staging module on first use.
    fn lookup(&self, name: &str) -> Option<FunctionValue<'ctx>> {
        if let Some(function) = self.staging.get_function(name) {
            return Some(function);
        }
        let published = self.module.get_function(name)?;
        Some(self.staging.add_function(name, published.get_type(), None))
    }

    /// Checks a definition against an earlier `extern` of the same name.
    fn match_declaration(declared: FunctionValue<'ctx>, proto: &Prototype) -> Result<(), CodegenError> {
        let arity = declared.count_params() as usize;
        if arity != proto.args.len() {
            return Err(CodegenError::ConflictingDeclaration {
                function: proto.name.clone(),
                declared: arity,
                found: proto.args.len(),
            });
        }
        for (param, name) in declared.get_param_iter().zip(&proto.args) {
            let float_param = param.into_float_value();
            let declared_name = float_param.get_name().to_string_lossy();
            if declared_name != name.as_str() {
                return Err(CodegenError::ArgumentMismatch {
                    function: proto.name.clone(),
                    declared: declared_name.into_owned(),
                    found: name.clone(),
                });
            }
        }
        Ok(())
    }
}

impl<'ctx> Visitor for Codegen<'ctx> {
    type Expr = Result<FloatValue<'ctx>, CodegenError>;
    type Item = Result<Lowered<'ctx>, CodegenError>;

    fn visit_literal(&mut self, value: f64) -> Self::Expr {
        Ok(self.context.f64_type().const_float(value))
    }

    fn visit_variable(&mut self, name: &str) -> Self::Expr {
        match self.named_values.get(name) {
            Some(var) => Ok(*var),
            None => Err(CodegenError::UnknownVariable(name.to_string())),
        }
    }

    fn visit_binary(&mut self, op: char, left: &Expression, right: &Expression) -> Self::Expr {
        let lhs = left.accept(self)?;
        let rhs = right.accept(self)?;

        match op {
            '<' => {
                let cmp = self
                    .builder
                    .build_float_compare(FloatPredicate::ULT, lhs, rhs, "cmptmp");
                Ok(self
                    .builder
                    .build_unsigned_int_to_float(cmp, self.context.f64_type(), "booltmp"))
            }
            '+' => Ok(self.builder.build_float_add(lhs, rhs, "addtmp")),
            '-' => Ok(self.builder.build_float_sub(lhs, rhs, "subtmp")),
            '*' => Ok(self.builder.build_float_mul(lhs, rhs, "multmp")),
            _ => Err(CodegenError::UnknownOperator(op)),
        }
    }

    fn visit_call(&mut self, callee: &str, args: &[Expression]) -> Self::Expr {
        let func = match self.lookup(callee) {
            Some(func) => func,
            None => return Err(CodegenError::UnknownFunction(callee.to_string())),
        };
        let arity = func.count_params() as usize;
        if arity != args.len() {
            return Err(CodegenError::InvalidCall(callee.to_string(), arity, args.len()));
        }

        let mut argsv: Vec<BasicMetadataValueEnum> = Vec::with_capacity(args.len());
        for arg in args {
            argsv.push(arg.accept(self)?.into());
        }

        match self
            .builder
            .build_call(func, &argsv, "calltmp")
            .try_as_basic_value()
            .left()
        {
            Some(value) => Ok(value.into_float_value()),
            None => Err(CodegenError::InvalidFunction(callee.to_string())),
        }
    }

    fn visit_prototype(&mut self, proto: &Prototype) -> Self::Item {
        if let Some(existing) = self.module.get_function(&proto.name) {
            let arity = existing.count_params() as usize;
            if arity != proto.args.len() {
                return Err(CodegenError::ConflictingDeclaration {
                    function: proto.name.clone(),
                    declared: arity,
                    found: proto.args.len(),
                });
            }
            debug!("'{}' is already declared", proto.name);
            return Ok(Lowered::Declaration(existing));
        }

        let decl = self.compile_proto(&self.module, &proto.name, &proto.args);
        debug!("declared '{}'", proto.name);
        Ok(Lowered::Declaration(decl))
    }

    fn visit_function(&mut self, function: &Function) -> Self::Item {
        let Function {
            prototype: proto,
            body,
        } = function;

        let name = if proto.is_anonymous() {
            ANONYMOUS_NAME
        } else {
            proto.name.as_str()
        };

        if let Some(existing) = self.module.get_function(name) {
            if existing.count_basic_blocks() > 0 {
                return Err(CodegenError::Redefinition(proto.name.clone()));
            }
            Self::match_declaration(existing, proto)?;
        }

        self.staging = self.context.create_module(name);
        let llvm_func = self.compile_proto(&self.staging, name, &proto.args);
        let entry = self.context.append_basic_block(llvm_func, "entry");
        self.builder.position_at_end(entry);

        // first binding wins when a name repeats
        self.named_values.clear();
        for (arg, arg_name) in llvm_func.get_param_iter().zip(&proto.args) {
            self.named_values
                .entry(arg_name.clone())
                .or_insert_with(|| arg.into_float_value());
        }

        let body = body.accept(self);
        self.builder.clear_insertion_position();
        let staging = mem::replace(&mut self.staging, self.context.create_module(STAGING));

        let body = match body {
            Ok(body) => body,
            Err(e) => {
                if !proto.is_anonymous() {
                    warn!("discarding definition of '{}': {}", proto.name, e);
                }
                return Err(e);
            }
        };

        self.builder.position_at_end(entry);
        self.builder.build_return(Some(&body));
        self.builder.clear_insertion_position();

        if !llvm_func.verify(true) {
            return Err(CodegenError::InvalidFunction(name.to_string()));
        }

        if proto.is_anonymous() {
            return Ok(Lowered::Expression(TopLevel {
                module: staging,
                function: llvm_func,
            }));
        }

        self.module
            .link_in_module(staging)
            .map_err(|e| CodegenError::Link(proto.name.clone(), e.to_string()))?;
        let published = self
            .module
            .get_function(name)
            .ok_or_else(|| CodegenError::UnknownFunction(proto.name.clone()))?;
        debug!("defined '{}'", proto.name);

        Ok(Lowered::Definition(published))
    }
}
