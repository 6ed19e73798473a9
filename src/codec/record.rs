//! Declarative records: a struct whose codec is the codec of each field,
//! applied in declaration order.

/// Declares a struct and derives its [`Reader`](crate::codec::Reader) and
/// [`Writer`](crate::codec::Writer) from its fields.
///
/// ```rust ignore
/// record! {
///     pub struct ConnectedPong {
///         pub ping_time: u64,
///         pub pong_time: u64,
///     }
/// }
/// ```
///
/// A failing field is named in the resulting
/// [`DecodeError`](crate::error::DecodeError).
#[macro_export]
macro_rules! record {
    (
        $(#[$meta: meta])*
        $vis: vis struct $name: ident {
            $($(#[$fmeta: meta])* $fvis: vis $field: ident: $ty: ty),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis struct $name {
            $($(#[$fmeta])* $fvis $field: $ty),*
        }

        impl $crate::codec::Reader for $name {
            #[allow(unused_variables)]
            fn read(
                buf: &mut $crate::codec::ByteReader<'_>,
            ) -> ::std::result::Result<Self, $crate::error::DecodeError> {
                Ok(Self {
                    $($field: buf.read_field::<$ty>(stringify!($field))?),*
                })
            }
        }

        impl $crate::codec::Writer for $name {
            #[allow(unused_variables)]
            fn write(
                &self,
                buf: &mut $crate::codec::ByteWriter,
            ) -> ::std::result::Result<(), $crate::error::EncodeError> {
                $(buf.write_type(&self.$field)?;)*
                Ok(())
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::codec::{Reader, U24, VarString, Writer};
    use crate::error::DecodeErrorKind;

    crate::record! {
        struct Sample {
            id: u8,
            sequence: U24,
            name: VarString,
        }
    }

    crate::record! {
        struct Nothing {}
    }

    #[test]
    fn fields_are_applied_in_order() {
        let sample = Sample {
            id: 7,
            sequence: U24(1),
            name: VarString("a".into()),
        };
        let bytes = sample.write_to_bytes().unwrap();
        assert_eq!(bytes, vec![7, 1, 0, 0, 1, b'a']);
        assert_eq!(Sample::read_from_slice(&bytes).unwrap(), sample);
    }

    #[test]
    fn failures_name_the_field() {
        let err = Sample::read_from_slice(&[7, 1, 0]).unwrap_err();
        assert_eq!(err.field, "sequence");
        assert_eq!(err.offset, 1);
        assert!(matches!(err.kind, DecodeErrorKind::UnexpectedEof { .. }));
    }

    #[test]
    fn empty_records() {
        assert!(Nothing {}.write_to_bytes().unwrap().is_empty());
        assert_eq!(Nothing::read_from_slice(&[]).unwrap(), Nothing {});
    }
}
