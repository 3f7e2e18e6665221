use core::{marker::PhantomData, mem::MaybeUninit};

use crate::{error, WireFormat};

use fill_array::fill;

macro_rules! impl_number {
    ($TYPE:ty, $SIZE:expr) => {
        impl WireFormat for $TYPE {
            const SIZE: usize = $SIZE;

            fn encode_iter<'a>(
                &self,
                dst: impl IntoIterator<Item = &'a mut u8>,
            ) -> Result<(), error::EndOfInput> {
                let mut dst = dst.into_iter();

                // network byte order, regardless of the target
                for byte in self.to_be_bytes() {
                    *dst.next().ok_or(error::EndOfInput)? = byte;
                }

                Ok(())
            }

            fn decode_iter<'a>(src: impl IntoIterator<Item = &'a u8>) -> Result<Self, error::Error> {
                let mut src = src.into_iter();

                // all byte values are valid
                let bytes = fill![*src.next().ok_or(error::EndOfInput)?; $SIZE];

                Ok(Self::from_be_bytes(bytes))
            }
        }
    };
}

// isize/usize have platform specific size and never go on the wire
impl_number!(u8, 1);
impl_number!(u16, 2);
impl_number!(u32, 4);
impl_number!(u64, 8);
impl_number!(i8, 1);
impl_number!(i16, 2);
impl_number!(i32, 4);
impl_number!(i64, 8);
impl_number!(f32, 4);
impl_number!(f64, 8);

impl WireFormat for bool {
    const SIZE: usize = 1;

    fn encode_iter<'a>(
        &self,
        dst: impl IntoIterator<Item = &'a mut u8>,
    ) -> Result<(), error::EndOfInput> {
        let mut dst = dst.into_iter();

        *dst.next().ok_or(error::EndOfInput)? = u8::from(*self);

        Ok(())
    }

    fn decode_iter<'a>(src: impl IntoIterator<Item = &'a u8>) -> Result<Self, error::Error> {
        let mut src = src.into_iter();

        match *src.next().ok_or(error::EndOfInput)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(error::Invalid)?,
        }
    }
}

impl<T: WireFormat, const N: usize> WireFormat for [T; N] {
    const SIZE: usize = T::SIZE * N;

    fn encode_iter<'a>(
        &self,
        dst: impl IntoIterator<Item = &'a mut u8>,
    ) -> Result<(), error::EndOfInput> {
        let mut dst = dst.into_iter();

        for item in self {
            item.encode_iter(&mut dst)?;
        }

        Ok(())
    }

    fn decode_iter<'a>(src: impl IntoIterator<Item = &'a u8>) -> Result<Self, error::Error> {
        let mut src = src.into_iter();

        // `MaybeUninit` is used to avoid a `Default` requirement
        // SAFETY: an array of `MaybeUninit` needs no initialization
        let mut result: [MaybeUninit<T>; N] = unsafe { MaybeUninit::uninit().assume_init() };

        for value in result.iter_mut() {
            value.write(T::decode_iter(&mut src)?);
        }

        // SAFETY: by now all elements are initialized
        Ok(result.map(|e| unsafe { e.assume_init() }))
    }
}

macro_rules! impl_tuple {
    ( $(($TYPE:ident, $NAME:ident)),+ ) => {
        impl<$($TYPE: WireFormat),+> WireFormat for ($($TYPE,)+) {
            const SIZE: usize = 0 $(+ $TYPE::SIZE)+;

            fn encode_iter<'a>(
                &self,
                dst: impl IntoIterator<Item = &'a mut u8>,
            ) -> Result<(), error::EndOfInput> {
                let mut dst = dst.into_iter();

                let ($($NAME,)+) = self;

                $(
                    $NAME.encode_iter(&mut dst)?;
                )+

                Ok(())
            }

            fn decode_iter<'a>(src: impl IntoIterator<Item = &'a u8>) -> Result<Self, error::Error> {
                let mut src = src.into_iter();

                $(
                    let $NAME = $TYPE::decode_iter(&mut src)?;
                )+

                Ok(($($NAME,)+))
            }
        }
    };
}

impl_tuple!((A, a));
impl_tuple!((A, a), (B, b));
impl_tuple!((A, a), (B, b), (C, c));
impl_tuple!((A, a), (B, b), (C, c), (D, d));
impl_tuple!((A, a), (B, b), (C, c), (D, d), (E, e));
impl_tuple!((A, a), (B, b), (C, c), (D, d), (E, e), (F, f));

impl<T> WireFormat for PhantomData<T> {
    const SIZE: usize = 0;

    fn encode_iter<'a>(
        &self,
        _dst: impl IntoIterator<Item = &'a mut u8>,
    ) -> Result<(), error::EndOfInput> {
        Ok(())
    }

    fn decode_iter<'a>(_src: impl IntoIterator<Item = &'a u8>) -> Result<Self, error::Error> {
        Ok(PhantomData)
    }
}
