//! A compilation session: parse, generate, submit and run top-level items
//! one at a time.

use std::io::Read;

use crate::{
    ast::{Function, Item, Prototype},
    backend::ExecutionBackend,
    codegen::{CodeGen, PrototypeRegistry},
    lexer::Lexer,
    module::Module,
    parser::{Parser, PrecedenceTable, ANON_EXPR_NAME},
    result::Result,
};

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Name given to every module.
    pub module_name: String,
    /// Name of the function wrapping top-level expressions.
    pub anon_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            module_name: "my cool jit".to_string(),
            anon_name: ANON_EXPR_NAME.to_string(),
        }
    }
}

/// What handling a top-level item produced. `ir` is the text of the
/// generated function or declaration.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Defined { name: String, ir: String },
    Declared { name: String, ir: String },
    Evaluated { value: f64, ir: String },
}

impl Outcome {
    pub fn ir(&self) -> &str {
        match self {
            Outcome::Defined { ir, .. }
            | Outcome::Declared { ir, .. }
            | Outcome::Evaluated { ir, .. } => ir,
        }
    }
}

pub struct Session<B: ExecutionBackend> {
    config: SessionConfig,
    precedence: PrecedenceTable,
    protos: PrototypeRegistry,
    // Collects declarations until the next submission.
    module: Module,
    backend: B,
    // Submitted definitions stay live for the whole session.
    definitions: Vec<B::Handle>,
}

impl<B: ExecutionBackend> Session<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, SessionConfig::default())
    }

    pub fn with_config(backend: B, config: SessionConfig) -> Self {
        Session {
            module: Module::new(&config.module_name),
            config,
            precedence: PrecedenceTable::default(),
            protos: PrototypeRegistry::new(),
            backend,
            definitions: vec![],
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn precedence(&self) -> &PrecedenceTable {
        &self.precedence
    }

    pub fn precedence_mut(&mut self) -> &mut PrecedenceTable {
        &mut self.precedence
    }

    pub fn prototypes(&self) -> &PrototypeRegistry {
        &self.protos
    }

    /// The module that has not been submitted yet.
    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Text of the module that has not been submitted yet.
    pub fn dump(&self) -> String {
        self.module.dump()
    }

    /// Parse the next top-level item off `lexer`.
    pub fn parse_item<R: Read>(&self, lexer: &mut Lexer<R>) -> Result<Option<Item>> {
        Parser::new(lexer, &self.precedence)
            .with_anon_name(&self.config.anon_name)
            .parse_top_level_item()
    }

    pub fn handle_item(&mut self, item: Item) -> Result<Outcome> {
        match item {
            Item::Definition(function) => self.handle_definition(function),
            Item::Extern(proto) => self.handle_extern(proto),
            Item::Expression(function) => self.handle_expression(function),
        }
    }

    /// Parse and handle every item in `src`. After a parse error one token
    /// is skipped, and parsing resumes.
    pub fn run_source(&mut self, src: &str) -> Vec<Result<Outcome>> {
        let mut lexer = Lexer::new(src.as_bytes());
        let mut outcomes = vec![];
        loop {
            match self.parse_item(&mut lexer) {
                Ok(Some(item)) => outcomes.push(self.handle_item(item)),
                Ok(None) => return outcomes,
                Err(err) => {
                    outcomes.push(Err(err));
                    if let Err(err) = lexer.skip_token() {
                        outcomes.push(Err(err));
                        return outcomes;
                    }
                }
            }
        }
    }

    fn codegen(&mut self) -> CodeGen<'_> {
        CodeGen::new(&mut self.module, &mut self.protos)
    }

    /// Hand over the current module, starting a fresh one.
    fn take_module(&mut self) -> Module {
        std::mem::replace(&mut self.module, Module::new(&self.config.module_name))
    }

    /// A definition the backend rejects leaves the registry as it was.
    fn handle_definition(&mut self, function: Function) -> Result<Outcome> {
        let name = &function.proto.name;
        let previous = self.protos.get(name).cloned();
        let func = self.codegen().codegen_function(&function)?;
        let ir = func.disp(&self.module).to_string();
        let unit = self.take_module();
        log::info!("submitting definition of {}", name);
        let handle = match self.backend.submit(unit) {
            Ok(handle) => handle,
            Err(err) => {
                self.protos.restore(name, previous);
                return Err(err);
            }
        };
        self.definitions.push(handle);
        Ok(Outcome::Defined {
            name: function.proto.name,
            ir,
        })
    }

    fn handle_extern(&mut self, proto: Prototype) -> Result<Outcome> {
        let func = self.codegen().codegen_prototype(&proto)?;
        let ir = func.disp(&self.module).to_string();
        Ok(Outcome::Declared {
            name: proto.name,
            ir,
        })
    }

    fn handle_expression(&mut self, function: Function) -> Result<Outcome> {
        let func = self.codegen().codegen_function(&function)?;
        let ir = func.disp(&self.module).to_string();
        let unit = self.take_module();
        let handle = self.backend.submit(unit)?;

        let value = self
            .backend
            .lookup(&self.config.anon_name)
            .and_then(|sym| self.backend.call(&sym.name, &[]));
        let revoked = self.backend.revoke(handle);
        let value = value?;
        revoked?;
        log::info!("evaluated {} to {}", self.config.anon_name, value);
        Ok(Outcome::Evaluated { value, ir })
    }
}
