//! Typed, composable conversions between argument values.
//!
//! A [`Converter`] turns one boxed value into another with access to the
//! invoking [`Interaction`]. Converters with a [`Void`] input derive their value
//! from the interaction alone and back contextual parameters.

pub mod builtin;
pub mod registry;
pub mod time;

pub use registry::ConverterRegistry;

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::CommandError;
use crate::interaction::Interaction;

/// A value travelling through a converter.
pub type Arg = Box<dyn Any + Send + Sync>;

type ConvertFn = dyn Fn(&Interaction, Arg, TypeTag) -> Result<Arg, CommandError> + Send + Sync;

/// Input marker for converters that read only from the interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Void;

/// Abstract supertype of every primitive number.
#[derive(Debug, Clone, Copy)]
pub struct AnyNumber;

/// Abstract supertype of every enum registered with [`ConverterRegistry::register_enum`].
#[derive(Debug, Clone, Copy)]
pub struct AnyEnum;

/// Identity of a type, with its name kept for diagnostics.
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    pub fn of<T: Any>() -> Self {
        TypeTag {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Enum usable as an option, converted by ordinal or by name.
pub trait OptionEnum: Any + Clone + Send + Sync {
    fn variants() -> &'static [Self];

    fn name(&self) -> &'static str;
}

/// Primitive number pulled out of an [`Arg`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Integer(i64),
    Float(f64),
}

impl Numeric {
    pub fn from_arg(arg: &Arg) -> Option<Self> {
        let any: &(dyn Any + Send + Sync) = &**arg;
        if let Some(value) = any.downcast_ref::<i64>() {
            return Some(Numeric::Integer(*value));
        }
        if let Some(value) = any.downcast_ref::<i32>() {
            return Some(Numeric::Integer(i64::from(*value)));
        }
        if let Some(value) = any.downcast_ref::<i16>() {
            return Some(Numeric::Integer(i64::from(*value)));
        }
        if let Some(value) = any.downcast_ref::<i8>() {
            return Some(Numeric::Integer(i64::from(*value)));
        }
        if let Some(value) = any.downcast_ref::<f64>() {
            return Some(Numeric::Float(*value));
        }
        any.downcast_ref::<f32>()
            .map(|value| Numeric::Float(f64::from(*value)))
    }

    /// Integer value, truncating floats. `None` for non-finite or out-of-range floats.
    pub fn as_i64(self) -> Option<i64> {
        match self {
            Numeric::Integer(value) => Some(value),
            Numeric::Float(value) => {
                let truncated = value.trunc();
                if truncated.is_finite() && truncated >= i64::MIN as f64 && truncated <= i64::MAX as f64 {
                    Some(truncated as i64)
                } else {
                    None
                }
            }
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Numeric::Integer(value) => value as f64,
            Numeric::Float(value) => value,
        }
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Numeric::Integer(value) => write!(f, "{}", value),
            Numeric::Float(value) => write!(f, "{}", value),
        }
    }
}

pub(crate) fn downcast<T: Any>(arg: Arg, position: usize) -> Result<T, CommandError> {
    arg.downcast::<T>()
        .map(|value| *value)
        .map_err(|_| CommandError::UnexpectedArgument {
            position,
            expected: type_name::<T>(),
        })
}

/// A single conversion step. Immutable once built.
#[derive(Clone)]
pub struct Converter {
    input: TypeTag,
    output: TypeTag,
    can_convert_to: bool,
    can_convert_from: bool,
    convert: Arc<ConvertFn>,
}

impl Converter {
    pub fn new<I, O, F>(convert: F) -> Self
    where
        I: Any + Send + Sync,
        O: Any + Send + Sync,
        F: Fn(&Interaction, I) -> Result<O, CommandError> + Send + Sync + 'static,
    {
        Self::with_target::<I, O, _>(move |interaction, input, _| convert(interaction, input))
    }

    /// Like [`new`](Self::new), but the closure also sees the requested target type.
    pub fn with_target<I, O, F>(convert: F) -> Self
    where
        I: Any + Send + Sync,
        O: Any + Send + Sync,
        F: Fn(&Interaction, I, TypeTag) -> Result<O, CommandError> + Send + Sync + 'static,
    {
        Self::from_tags(TypeTag::of::<I>(), TypeTag::of::<O>(), move |interaction, arg, target| {
            let input = downcast::<I>(arg, 0)?;
            convert(interaction, input, target).map(|output| Box::new(output) as Arg)
        })
    }

    /// A converter that derives its value from the interaction only.
    pub fn contextual<O, F>(derive: F) -> Self
    where
        O: Any + Send + Sync,
        F: Fn(&Interaction) -> Result<O, CommandError> + Send + Sync + 'static,
    {
        Self::from_tags(TypeTag::of::<Void>(), TypeTag::of::<O>(), move |interaction, _, _| {
            derive(interaction).map(|output| Box::new(output) as Arg)
        })
    }

    /// Converts any primitive number, for converters registered against [`AnyNumber`].
    pub fn numeric<O, F>(convert: F) -> Self
    where
        O: Any + Send + Sync,
        F: Fn(&Interaction, Numeric) -> Result<O, CommandError> + Send + Sync + 'static,
    {
        Self::from_tags(TypeTag::of::<AnyNumber>(), TypeTag::of::<O>(), move |interaction, arg, _| {
            let number = Numeric::from_arg(&arg).ok_or(CommandError::UnexpectedArgument {
                position: 0,
                expected: "number",
            })?;
            convert(interaction, number).map(|output| Box::new(output) as Arg)
        })
    }

    /// Untyped constructor for inputs that are abstract markers.
    pub fn from_tags<F>(input: TypeTag, output: TypeTag, convert: F) -> Self
    where
        F: Fn(&Interaction, Arg, TypeTag) -> Result<Arg, CommandError> + Send + Sync + 'static,
    {
        Converter {
            input,
            output,
            can_convert_to: true,
            can_convert_from: true,
            convert: Arc::new(convert),
        }
    }

    pub fn identity(tag: TypeTag) -> Self {
        Self::from_tags(tag, tag, |_, arg, _| Ok(arg))
    }

    /// Only allows this converter at the start of a chain.
    pub fn first_step_only(mut self) -> Self {
        self.can_convert_to = false;
        self
    }

    /// Only allows this converter at the end of a chain.
    pub fn last_step_only(mut self) -> Self {
        self.can_convert_from = false;
        self
    }

    pub fn input(&self) -> TypeTag {
        self.input
    }

    pub fn output(&self) -> TypeTag {
        self.output
    }

    pub fn can_convert_to(&self) -> bool {
        self.can_convert_to
    }

    pub fn can_convert_from(&self) -> bool {
        self.can_convert_from
    }

    pub fn convert(&self, interaction: &Interaction, arg: Arg, target: TypeTag) -> Result<Arg, CommandError> {
        (self.convert)(interaction, arg, target)
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("input", &self.input)
            .field("output", &self.output)
            .field("can_convert_to", &self.can_convert_to)
            .field("can_convert_from", &self.can_convert_from)
            .finish()
    }
}

/// Ordered converters bridging `input` to `output`.
#[derive(Debug, Clone)]
pub struct ConverterChain {
    input: TypeTag,
    output: TypeTag,
    steps: Vec<Arc<Converter>>,
}

impl ConverterChain {
    pub(crate) fn new(input: TypeTag, output: TypeTag, steps: Vec<Arc<Converter>>) -> Self {
        ConverterChain { input, output, steps }
    }

    pub fn single(converter: Arc<Converter>, input: TypeTag, output: TypeTag) -> Self {
        Self::new(input, output, vec![converter])
    }

    pub fn input(&self) -> TypeTag {
        self.input
    }

    pub fn output(&self) -> TypeTag {
        self.output
    }

    pub fn steps(&self) -> &[Arc<Converter>] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Types visited by the chain, starting with its requested input.
    pub fn path(&self) -> Vec<TypeTag> {
        let mut path = vec![self.input];
        path.extend(self.steps.iter().map(|step| step.output()));
        path
    }

    /// Runs every step in order. Intermediate steps target their own output,
    /// the final step targets the requested output.
    pub fn convert(&self, interaction: &Interaction, arg: Arg) -> Result<Arg, CommandError> {
        let last = self.steps.len().saturating_sub(1);
        self.steps
            .iter()
            .enumerate()
            .try_fold(arg, |value, (index, step)| {
                let target = if index == last { self.output } else { step.output() };
                step.convert(interaction, value, target)
            })
    }

    pub fn convert_into<T: Any>(&self, interaction: &Interaction, arg: Arg) -> Result<T, CommandError> {
        downcast::<T>(self.convert(interaction, arg)?, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::{InteractionKind, User};

    fn interaction() -> Interaction {
        Interaction::new(InteractionKind::Slash, "test", User::new(1, "tester"))
    }

    #[test]
    fn test_type_tag_identity() {
        assert_eq!(TypeTag::of::<String>(), TypeTag::of::<String>());
        assert_ne!(TypeTag::of::<String>(), TypeTag::of::<&'static str>());
        assert!(TypeTag::of::<i64>().is::<i64>());
        assert!(TypeTag::of::<Void>().name().ends_with("Void"));
    }

    #[test]
    fn test_typed_converter_rejects_wrong_input() {
        let length = Converter::new(|_, input: String| Ok(input.len()));
        let ok = length.convert(&interaction(), Box::new("four".to_string()), TypeTag::of::<usize>());
        assert_eq!(*ok.unwrap().downcast::<usize>().unwrap(), 4);

        let wrong = length.convert(&interaction(), Box::new(4u8), TypeTag::of::<usize>());
        assert!(matches!(wrong, Err(CommandError::UnexpectedArgument { .. })));
    }

    #[test]
    fn test_numeric_reads_every_primitive() {
        assert_eq!(Numeric::from_arg(&(Box::new(3i8) as Arg)), Some(Numeric::Integer(3)));
        assert_eq!(Numeric::from_arg(&(Box::new(2.5f32) as Arg)), Some(Numeric::Float(2.5)));
        assert_eq!(Numeric::from_arg(&(Box::new("3".to_string()) as Arg)), None);
        assert_eq!(Numeric::Float(-2.9).as_i64(), Some(-2));
        assert_eq!(Numeric::Float(f64::NAN).as_i64(), None);
    }

    #[test]
    fn test_chain_passes_requested_target_to_last_step() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let first_seen = seen.clone();
        let second_seen = seen.clone();
        let first = Converter::with_target(move |_, input: String, target| {
            first_seen.lock().unwrap().push(target);
            Ok(input.len() as i64)
        });
        let second = Converter::with_target(move |_, input: i64, target| {
            second_seen.lock().unwrap().push(target);
            Ok(input * 2)
        });
        let chain = ConverterChain::new(
            TypeTag::of::<String>(),
            TypeTag::of::<u8>(),
            vec![Arc::new(first), Arc::new(second)],
        );

        let value: i64 = chain
            .convert_into(&interaction(), Box::new("abc".to_string()))
            .unwrap();
        assert_eq!(value, 6);
        assert_eq!(*seen.lock().unwrap(), vec![TypeTag::of::<i64>(), TypeTag::of::<u8>()]);
    }
}
