use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::fmt;
use std::os::raw::{c_char, c_void};
use std::rc::Rc;

use libffi::middle::{Cif, CodePtr};
use libffi::raw;

use crate::ctype::CType;
use crate::error::Error;
use crate::interner;
use crate::memory;
use crate::value::{Obj, PointerObj, Value};

//===----------------------------------------------------------------------===//
// C function descriptors
//===----------------------------------------------------------------------===//

/// Runtime metadata describing a callable C symbol: its signature, the
/// resolved address, and the lazily prepared call interface.
pub struct CFunctionDesc {
    pub name: String,
    pub return_type: CType,
    pub param_types: Vec<CType>,
    pub is_variadic: bool,
    pub func_ptr: *mut c_void,
    cif: RefCell<Option<Cif>>,
}

impl fmt::Debug for CFunctionDesc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CFunctionDesc")
            .field("name", &self.name)
            .field("return_type", &self.return_type)
            .field("param_types", &self.param_types)
            .field("is_variadic", &self.is_variadic)
            .field("prepared", &self.is_prepared())
            .finish()
    }
}

impl CFunctionDesc {
    pub fn new(
        name: &str,
        return_type: CType,
        param_types: Vec<CType>,
        is_variadic: bool,
        func_ptr: *mut c_void,
    ) -> Rc<Self> {
        Rc::new(CFunctionDesc {
            name: name.to_string(),
            return_type,
            param_types,
            is_variadic,
            func_ptr,
            cif: RefCell::new(None),
        })
    }

    pub fn is_prepared(&self) -> bool {
        self.cif.borrow().is_some()
    }

    /// Builds the fixed-arity call interface once. Variadic descriptors are
    /// re-prepared per call instead, when the actual argument count is known.
    pub fn prepare(&self) -> bool {
        if self.is_prepared() {
            return true;
        }
        let params = self.param_types.iter().map(|t| t.ffi_type());
        let cif = Cif::new(params, self.return_type.ffi_type());
        *self.cif.borrow_mut() = Some(cif);
        true
    }
}

/// The heap object wrapping a descriptor for the evaluator.
pub struct CFunctionObj {
    pub desc: Rc<CFunctionDesc>,
}

impl fmt::Debug for CFunctionObj {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CFunctionObj({})", self.desc.name)
    }
}

impl CFunctionObj {
    pub fn new(desc: Rc<CFunctionDesc>) -> Rc<Self> {
        memory::track(std::mem::size_of::<CFunctionObj>());
        Rc::new(CFunctionObj { desc })
    }
}

impl Drop for CFunctionObj {
    fn drop(&mut self) {
        memory::release(std::mem::size_of::<CFunctionObj>());
    }
}

//===----------------------------------------------------------------------===//
// Marshalling
//===----------------------------------------------------------------------===//

/// One argument or result slot. 16 bytes covers every supported scalar and
/// pointer kind.
#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub struct Slot(pub [u8; 16]);

impl Slot {
    pub fn zeroed() -> Slot {
        Slot([0; 16])
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.0.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.0.as_mut_ptr()
    }
}

unsafe fn write_slot<T>(ptr: *mut u8, v: T) {
    std::ptr::write_unaligned(ptr as *mut T, v);
}

unsafe fn read_slot<T: Copy>(ptr: *const u8) -> T {
    std::ptr::read_unaligned(ptr as *const T)
}

/// Writes `value` as C type `ctype` at `out`. Strings are materialized as
/// NUL-terminated buffers pushed onto `strings`, which must outlive every
/// use of the written pointer.
pub fn marshal_to_c(
    value: &Value,
    ctype: CType,
    out: *mut u8,
    strings: &mut Vec<CString>,
) -> Result<(), Error> {
    unsafe {
        match ctype {
            CType::Void => return Ok(()),

            CType::Char | CType::SChar | CType::Int8 => {
                if let Value::Int(v) = value {
                    write_slot::<i8>(out, *v as i8);
                    return Ok(());
                }
                if let Some(s) = value.as_str() {
                    if let Some(first) = s.as_str().bytes().next() {
                        write_slot::<i8>(out, first as i8);
                        return Ok(());
                    }
                }
            }

            CType::UChar | CType::UInt8 => {
                if let Value::Int(v) = value {
                    write_slot::<u8>(out, *v as u8);
                    return Ok(());
                }
            }

            CType::Short | CType::Int16 => {
                if let Value::Int(v) = value {
                    write_slot::<i16>(out, *v as i16);
                    return Ok(());
                }
            }

            CType::UShort | CType::UInt16 => {
                if let Value::Int(v) = value {
                    write_slot::<u16>(out, *v as u16);
                    return Ok(());
                }
            }

            CType::Int | CType::Int32 | CType::Bool => {
                if let Value::Int(v) = value {
                    write_slot::<i32>(out, *v as i32);
                    return Ok(());
                }
                if let Value::Bool(b) = value {
                    write_slot::<i32>(out, *b as i32);
                    return Ok(());
                }
            }

            CType::UInt | CType::UInt32 => {
                if let Value::Int(v) = value {
                    write_slot::<u32>(out, *v as u32);
                    return Ok(());
                }
            }

            CType::Long | CType::LongLong | CType::Int64 => {
                if let Value::Int(v) = value {
                    write_slot::<i64>(out, *v);
                    return Ok(());
                }
            }

            CType::ULong | CType::ULongLong | CType::UInt64 | CType::SizeT => {
                if let Value::Int(v) = value {
                    write_slot::<u64>(out, *v as u64);
                    return Ok(());
                }
            }

            CType::Float => {
                if let Value::Int(v) = value {
                    write_slot::<f32>(out, *v as f32);
                    return Ok(());
                }
                if let Value::Float(v) = value {
                    write_slot::<f32>(out, *v as f32);
                    return Ok(());
                }
            }

            CType::Double => {
                if let Value::Int(v) = value {
                    write_slot::<f64>(out, *v as f64);
                    return Ok(());
                }
                if let Value::Float(v) = value {
                    write_slot::<f64>(out, *v);
                    return Ok(());
                }
            }

            CType::String => {
                if let Value::Nil = value {
                    write_slot::<*const c_char>(out, std::ptr::null());
                    return Ok(());
                }
                if let Some(s) = value.as_str() {
                    let buffer = CString::new(s.as_str()).map_err(|_| {
                        Error::Ffi("String contains interior NUL".to_string())
                    })?;
                    write_slot::<*const c_char>(out, buffer.as_ptr());
                    strings.push(buffer);
                    return Ok(());
                }
            }

            CType::Pointer => match value {
                Value::Nil => {
                    write_slot::<*mut c_void>(out, std::ptr::null_mut());
                    return Ok(());
                }
                Value::Obj(Obj::Pointer(p)) => {
                    write_slot::<usize>(out, p.addr);
                    return Ok(());
                }
                Value::Obj(Obj::CStruct(s)) => {
                    write_slot::<*const u8>(out, s.data_ptr());
                    return Ok(());
                }
                // Explicit contract: handles may travel as integers.
                Value::Int(v) => {
                    write_slot::<usize>(out, *v as usize);
                    return Ok(());
                }
                _ => {}
            },

            CType::Struct => {
                if let Value::Obj(Obj::CStruct(s)) = value {
                    write_slot::<*const u8>(out, s.data_ptr());
                    return Ok(());
                }
            }
        }
    }

    Err(Error::Ffi(format!(
        "Cannot marshal {} to {}",
        value.type_name(),
        ctype.name()
    )))
}

/// Reads a C value of kind `ctype` at `ptr` and builds the script value.
///
/// # Safety
/// `ptr` must point at least `ctype.size()` readable bytes, and for string
/// and pointer kinds must hold a valid (or null) address.
pub unsafe fn marshal_from_c(ptr: *const u8, ctype: CType) -> Value {
    match ctype {
        CType::Void | CType::Struct => Value::Nil,

        CType::Char | CType::SChar | CType::Int8 => Value::Int(read_slot::<i8>(ptr) as i64),
        CType::UChar | CType::UInt8 => Value::Int(read_slot::<u8>(ptr) as i64),
        CType::Short | CType::Int16 => Value::Int(read_slot::<i16>(ptr) as i64),
        CType::UShort | CType::UInt16 => Value::Int(read_slot::<u16>(ptr) as i64),
        CType::Int | CType::Int32 => Value::Int(read_slot::<i32>(ptr) as i64),
        CType::UInt | CType::UInt32 => Value::Int(read_slot::<u32>(ptr) as i64),
        CType::Long | CType::LongLong | CType::Int64 => {
            Value::Int(read_slot::<i64>(ptr))
        }
        // Values above i64::MAX reinterpret as negative; a documented loss.
        CType::ULong | CType::ULongLong | CType::UInt64 | CType::SizeT => {
            Value::Int(read_slot::<u64>(ptr) as i64)
        }

        CType::Float => Value::Float(read_slot::<f32>(ptr) as f64),
        CType::Double => Value::Float(read_slot::<f64>(ptr)),
        CType::Bool => Value::Bool(read_slot::<i32>(ptr) != 0),

        CType::String => {
            let s = read_slot::<*const c_char>(ptr);
            if s.is_null() {
                Value::Nil
            } else {
                let text = CStr::from_ptr(s).to_string_lossy();
                Value::str(interner::intern(&text))
            }
        }

        CType::Pointer => {
            let p = read_slot::<*mut c_void>(ptr);
            if p.is_null() {
                Value::Nil
            } else {
                Value::Obj(Obj::Pointer(PointerObj::new(p as usize, "void*")))
            }
        }
    }
}

//===----------------------------------------------------------------------===//
// The foreign call
//===----------------------------------------------------------------------===//

/// Target C type for argument `i`: the declared parameter type, or a kind
/// inferred from the value for the variadic tail.
fn argument_type(desc: &CFunctionDesc, index: usize, value: &Value) -> CType {
    if index < desc.param_types.len() {
        return desc.param_types[index];
    }
    match value {
        Value::Int(_) => CType::Int,
        Value::Float(_) => CType::Double,
        Value::Obj(Obj::Str(_)) => CType::String,
        Value::Obj(Obj::Pointer(_)) => CType::Pointer,
        _ => CType::Int,
    }
}

/// Performs the foreign call described by `desc` with the given arguments.
pub fn call(desc: &CFunctionDesc, args: &[Value]) -> Result<Value, Error> {
    let declared = desc.param_types.len();
    if !desc.is_variadic && args.len() != declared {
        return Err(Error::Ffi(format!(
            "{} expects {} arguments, got {}",
            desc.name,
            declared,
            args.len()
        )));
    }
    if desc.is_variadic && args.len() < declared {
        return Err(Error::Ffi(format!(
            "{} expects at least {} arguments, got {}",
            desc.name,
            declared,
            args.len()
        )));
    }

    let mut slots = vec![Slot::zeroed(); args.len()];
    let mut strings: Vec<CString> = Vec::new();

    for (i, arg) in args.iter().enumerate() {
        let target = argument_type(desc, i, arg);
        marshal_to_c(arg, target, slots[i].as_mut_ptr(), &mut strings).map_err(
            |_| {
                Error::Ffi(format!(
                    "Failed to marshal argument {} of {} to {}",
                    i,
                    desc.name,
                    target.name()
                ))
            },
        )?;
    }

    let mut avalues: Vec<*mut c_void> =
        slots.iter_mut().map(|s| s.as_mut_ptr() as *mut c_void).collect();
    let mut ret = Slot::zeroed();
    let code = CodePtr(desc.func_ptr);

    if desc.is_variadic {
        // Re-prepare per call so the fixed/total split reflects the actual
        // argument count.
        let types: Vec<libffi::middle::Type> = args
            .iter()
            .enumerate()
            .map(|(i, arg)| argument_type(desc, i, arg).ffi_type())
            .collect();
        let mut raw_types: Vec<*mut raw::ffi_type> =
            types.iter().map(|t| t.as_raw_ptr()).collect();
        let ret_type = desc.return_type.ffi_type();

        let mut cif: raw::ffi_cif = unsafe { std::mem::zeroed() };
        let status = unsafe {
            raw::ffi_prep_cif_var(
                &mut cif,
                raw::ffi_abi_FFI_DEFAULT_ABI,
                declared as u32,
                args.len() as u32,
                ret_type.as_raw_ptr(),
                raw_types.as_mut_ptr(),
            )
        };
        if status != raw::ffi_status_FFI_OK {
            return Err(Error::Ffi(format!(
                "Failed to prepare variadic call to {}",
                desc.name
            )));
        }

        unsafe {
            raw::ffi_call(
                &mut cif,
                Some(*code.as_safe_fun()),
                ret.as_mut_ptr() as *mut c_void,
                avalues.as_mut_ptr(),
            );
        }
    } else {
        if !desc.prepare() {
            return Err(Error::Ffi(format!(
                "Failed to prepare call to {}",
                desc.name
            )));
        }
        let cif = self_cif(desc);
        unsafe {
            raw::ffi_call(
                cif,
                Some(*code.as_safe_fun()),
                ret.as_mut_ptr() as *mut c_void,
                avalues.as_mut_ptr(),
            );
        }
    }

    // `strings` must outlive the result marshalling: a returned char* may
    // point back into an argument buffer (strchr-style functions).
    let result = unsafe { marshal_from_c(ret.as_ptr(), desc.return_type) };
    drop(strings);
    Ok(result)
}

fn self_cif(desc: &CFunctionDesc) -> *mut raw::ffi_cif {
    desc.cif
        .borrow()
        .as_ref()
        .map(|cif| cif.as_raw_ptr())
        .unwrap_or(std::ptr::null_mut())
}

//===----------------------------------------------------------------------===//
// C struct support
//===----------------------------------------------------------------------===//

#[derive(Debug, Clone)]
pub struct CFieldDesc {
    pub name: String,
    pub ctype: CType,
    pub offset: usize,
    pub size: usize,
    pub struct_desc: Option<Rc<CStructDesc>>,
}

#[derive(Debug)]
pub struct CStructDesc {
    pub name: String,
    pub fields: Vec<CFieldDesc>,
    pub size: usize,
    pub alignment: usize,
}

impl CStructDesc {
    pub fn new(name: &str, fields: Vec<(String, CType)>) -> Rc<Self> {
        let fields = fields
            .into_iter()
            .map(|(name, ctype)| CFieldDesc {
                name,
                ctype,
                offset: 0,
                size: ctype.size(),
                struct_desc: None,
            })
            .collect();
        let mut desc = CStructDesc {
            name: name.to_string(),
            fields,
            size: 0,
            alignment: 0,
        };
        desc.finalize();
        Rc::new(desc)
    }

    /// Computes offsets via natural alignment: each field aligns to
    /// min(its size, 8); the total size rounds up to the widest alignment.
    fn finalize(&mut self) {
        let mut max_align = 1usize;
        let mut offset = 0usize;

        for field in &mut self.fields {
            let field_size = match &field.struct_desc {
                Some(nested) => nested.size,
                None => field.ctype.size(),
            };
            let mut field_align = match &field.struct_desc {
                Some(nested) => nested.alignment,
                None => field_size.max(1),
            };
            if field_align > 8 {
                field_align = 8;
            }

            offset = (offset + field_align - 1) & !(field_align - 1);
            field.offset = offset;
            field.size = field_size;

            offset += field_size;
            if field_align > max_align {
                max_align = field_align;
            }
        }

        self.size = (offset + max_align - 1) & !(max_align - 1);
        self.alignment = max_align;
    }

    pub fn field(&self, name: &str) -> Option<&CFieldDesc> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// A struct instance: descriptor plus zero-initialized raw storage. String
/// fields keep their backing buffers alive alongside the data.
pub struct CStructObj {
    pub desc: Rc<CStructDesc>,
    data: RefCell<Box<[u8]>>,
    keepalive: RefCell<Vec<CString>>,
}

impl fmt::Debug for CStructObj {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CStructObj({})", self.desc.name)
    }
}

impl CStructObj {
    pub fn new(desc: Rc<CStructDesc>) -> Rc<Self> {
        memory::track(std::mem::size_of::<CStructObj>() + desc.size);
        let data = vec![0u8; desc.size].into_boxed_slice();
        Rc::new(CStructObj {
            desc,
            data: RefCell::new(data),
            keepalive: RefCell::new(Vec::new()),
        })
    }

    /// Raw address of the struct storage. Stable for the object's lifetime.
    pub fn data_ptr(&self) -> *const u8 {
        self.data.borrow().as_ptr()
    }

    pub fn get_field(&self, name: &str) -> Value {
        let Some(field) = self.desc.field(name) else {
            return Value::Nil;
        };
        let data = self.data.borrow();
        unsafe { marshal_from_c(data.as_ptr().add(field.offset), field.ctype) }
    }

    pub fn set_field(&self, name: &str, value: &Value) -> Result<(), Error> {
        let Some(field) = self.desc.field(name) else {
            return Err(Error::Ffi(format!(
                "struct {} has no field '{}'",
                self.desc.name, name
            )));
        };
        let mut data = self.data.borrow_mut();
        let mut strings = self.keepalive.borrow_mut();
        let offset = field.offset;
        marshal_to_c(value, field.ctype, unsafe { data.as_mut_ptr().add(offset) }, &mut strings)
    }
}

impl Drop for CStructObj {
    fn drop(&mut self) {
        memory::release(std::mem::size_of::<CStructObj>() + self.desc.size);
    }
}
