pub use crate::{
    any::{Any, AnyView},
    convert::{cant_convert, convert, convert_collect},
    defaults::default_value,
    encoding::{decode, decode_full, encode, encode_full, Reader, Serializer, SerializerExt},
    error_value::{ErrorValue, Expected},
    errors::{ErrorKind, ValueError},
    policy::SerPolicy,
    rep::{cached_type, de_type_of, ser_type_of, De, DeOwned, Ser},
    scan::scan,
    text::{parse, print_any, ParseMode, PrintOptions, TextError},
};
pub use bytes::Bytes;
