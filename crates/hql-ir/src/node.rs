//! The IR node sum type (spec.md §4.7): a typed tree mirroring the target
//! language's (JS/TS) AST, produced by lowering the canonical S-expression
//! program plus its symbol table.

/// A function parameter with an optional default value expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Box<IrNode>>,
}

/// A fully-typed `fx` parameter: name, declared type, and optional default.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedParam {
    pub name: String,
    pub ty: String,
    pub default: Option<Box<IrNode>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VarKind {
    Const,
    Let,
}

/// The closed IR node sum (spec.md §4.7). One variant per target-language
/// construct; `FxFunctionDeclaration`/`FnFunctionDeclaration`/
/// `EnumDeclaration` are specialized beyond plain `FunctionDeclaration` to
/// preserve HQL-specific metadata downstream emission needs.
#[derive(Debug, Clone, PartialEq)]
pub enum IrNode {
    Program {
        body: Vec<IrNode>,
    },
    StringLiteral {
        value: String,
    },
    NumericLiteral {
        value: f64,
    },
    BooleanLiteral {
        value: bool,
    },
    NullLiteral,
    Identifier {
        name: String,
    },
    CallExpression {
        callee: Box<IrNode>,
        arguments: Vec<IrNode>,
    },
    /// `obj.prop` (property an `Identifier`, `computed: false`) or
    /// `obj[expr]` (property any expression, `computed: true`).
    MemberExpression {
        object: Box<IrNode>,
        property: Box<IrNode>,
        computed: bool,
    },
    CallMemberExpression {
        object: Box<IrNode>,
        property: String,
        arguments: Vec<IrNode>,
    },
    NewExpression {
        callee: Box<IrNode>,
        arguments: Vec<IrNode>,
    },
    BinaryExpression {
        operator: String,
        left: Box<IrNode>,
        right: Box<IrNode>,
    },
    UnaryExpression {
        operator: String,
        argument: Box<IrNode>,
    },
    ConditionalExpression {
        test: Box<IrNode>,
        consequent: Box<IrNode>,
        alternate: Box<IrNode>,
    },
    ArrayExpression {
        elements: Vec<IrNode>,
    },
    ArrayConsExpression {
        head: Box<IrNode>,
        rest: Box<IrNode>,
    },
    FunctionExpression {
        params: Vec<Param>,
        body: Vec<IrNode>,
        is_arrow: bool,
    },
    ObjectExpression {
        properties: Vec<IrNode>,
    },
    ObjectProperty {
        key: String,
        value: Box<IrNode>,
        computed: bool,
    },
    SpreadAssignment {
        argument: Box<IrNode>,
    },
    VariableDeclaration {
        kind: VarKind,
        declarations: Vec<IrNode>,
    },
    VariableDeclarator {
        name: String,
        init: Option<Box<IrNode>>,
    },
    FunctionDeclaration {
        name: String,
        params: Vec<Param>,
        body: Vec<IrNode>,
    },
    ReturnStatement {
        argument: Option<Box<IrNode>>,
    },
    BlockStatement {
        body: Vec<IrNode>,
    },
    ImportDeclaration {
        specifiers: Vec<IrNode>,
        source: String,
    },
    ImportSpecifier {
        imported: String,
        local: String,
    },
    ExportNamedDeclaration {
        specifiers: Vec<IrNode>,
        declaration: Option<Box<IrNode>>,
    },
    ExportSpecifier {
        local: String,
        exported: String,
    },
    ExportVariableDeclaration {
        declaration: Box<IrNode>,
    },
    /// An IIFE wrapping interop shims around a host-language construct that
    /// doesn't map directly onto a single target-AST node.
    InteropIIFE {
        body: Vec<IrNode>,
        arguments: Vec<IrNode>,
    },
    CommentBlock {
        text: String,
    },
    /// Verbatim emitted text, for constructs lowering chooses not to model
    /// structurally (escape hatch, not a normal code path).
    Raw {
        text: String,
    },
    JsImportReference {
        module: String,
    },
    AssignmentExpression {
        operator: String,
        left: Box<IrNode>,
        right: Box<IrNode>,
    },
    ExpressionStatement {
        expression: Box<IrNode>,
    },
    FxFunctionDeclaration {
        name: String,
        params: Vec<TypedParam>,
        return_type: String,
        body: Vec<IrNode>,
    },
    FnFunctionDeclaration {
        name: String,
        params: Vec<Param>,
        body: Vec<IrNode>,
    },
    IfStatement {
        test: Box<IrNode>,
        consequent: Box<IrNode>,
        alternate: Option<Box<IrNode>>,
    },
    ClassDeclaration {
        name: String,
        fields: Vec<IrNode>,
        methods: Vec<IrNode>,
    },
    ClassField {
        name: String,
        value: Option<Box<IrNode>>,
    },
    ClassMethod {
        name: String,
        params: Vec<Param>,
        body: Vec<IrNode>,
    },
    ClassConstructor {
        params: Vec<Param>,
        body: Vec<IrNode>,
    },
    /// A member access immediately called, kept distinct from a generic
    /// `CallMemberExpression` when the receiver is itself a bare getter.
    GetAndCall {
        object: Box<IrNode>,
        property: String,
        arguments: Vec<IrNode>,
    },
    EnumDeclaration {
        name: String,
        cases: Vec<IrNode>,
    },
    EnumCase {
        name: String,
        raw_value: Option<String>,
        associated_values: Vec<String>,
    },
    JsMethodAccess {
        object: Box<IrNode>,
        property: String,
    },
}
