/// One inbound request from the host.
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    /// `PyInteger[name, i]`
    BindInteger { name: String, value: i64 },
    /// `PyReal[name, r]`
    BindReal { name: String, value: f64 },
    /// `PyComplex[name, re, im]`
    BindComplex { name: String, re: f64, im: f64 },
    /// `PyUnicodeString[name, "text"]`, carried as UTF-16 code units.
    BindUnicodeString { name: String, units: Vec<u16> },
    /// `PyString[name, {c1, c2, ...}]`
    BindByteString { name: String, codepoints: Vec<i64> },
    /// `PySymbol[name, sym]`
    BindSymbol { name: String, symbol: String },
    /// `PyOpenList[name]`
    OpenList { name: String },
    /// `PyCloseList[]`
    CloseList,
    /// `Py["source"]`
    Execute { source: String },
}

impl Instruction {
    pub fn head(&self) -> &'static str {
        match self {
            Instruction::BindInteger { .. } => "PyInteger",
            Instruction::BindReal { .. } => "PyReal",
            Instruction::BindComplex { .. } => "PyComplex",
            Instruction::BindUnicodeString { .. } => "PyUnicodeString",
            Instruction::BindByteString { .. } => "PyString",
            Instruction::BindSymbol { .. } => "PySymbol",
            Instruction::OpenList { .. } => "PyOpenList",
            Instruction::CloseList => "PyCloseList",
            Instruction::Execute { .. } => "Py",
        }
    }
}
