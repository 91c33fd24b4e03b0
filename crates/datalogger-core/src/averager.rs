//! Fixed-capacity running averages over integer samples.
//!
//! An [`Averager`] keeps the most recent samples in a ring buffer together with
//! a running sum, so pushing a sample and reading the average are both O(1).
//!
//! All six sample domains share one implementation. Each domain picks the
//! width of its running sum through the [`Sample`] trait:
//!
//! | Sample     | Accumulator |
//! |------------|-------------|
//! | `i8`, `i16`| `i32`       |
//! | `u8`, `u16`| `u32`       |
//! | `i32`      | `i64`       |
//! | `u32`      | `u64`       |
//!
//! Capacity is a non-zero `u16`, which keeps `capacity × T::MAX` (plus the
//! rounding bias) inside every accumulator.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt::{Debug, Display};
use core::num::NonZeroU16;
use core::ops::{Add, Sub};

/// A fixed-width integer reading that can be averaged.
pub trait Sample: Copy + Default + PartialEq + Debug + Display {
    /// Running-sum type, wide enough for `u16::MAX` copies of any value.
    type Acc: Copy + Default + PartialEq + Debug + Add<Output = Self::Acc> + Sub<Output = Self::Acc>;

    /// Lift a single sample into the accumulator domain.
    fn widen(self) -> Self::Acc;

    /// The sum of `times` copies of this sample.
    fn repeated(self, times: u16) -> Self::Acc;

    /// `sum / count` rounded half away from zero. Zero when `count == 0`.
    fn rounded_mean(sum: Self::Acc, count: u16) -> Self;

    /// `sum / count` without rounding. Zero when `count == 0`.
    fn float_mean(sum: Self::Acc, count: u16) -> f32;
}

macro_rules! impl_signed_sample {
    ($($t:ty => $acc:ty),* $(,)?) => {$(
        impl Sample for $t {
            type Acc = $acc;

            #[inline]
            fn widen(self) -> $acc {
                <$acc>::from(self)
            }

            #[inline]
            fn repeated(self, times: u16) -> $acc {
                <$acc>::from(self) * <$acc>::from(times)
            }

            fn rounded_mean(sum: $acc, count: u16) -> Self {
                if count == 0 {
                    return 0;
                }
                let count = <$acc>::from(count);
                let half = count / 2;
                // Integer division truncates toward zero, so bias away from it first
                let mean = if sum < 0 {
                    (sum - half) / count
                } else {
                    (sum + half) / count
                };
                mean as $t
            }

            fn float_mean(sum: $acc, count: u16) -> f32 {
                if count == 0 {
                    return 0.0;
                }
                (sum as f64 / f64::from(count)) as f32
            }
        }
    )*};
}

macro_rules! impl_unsigned_sample {
    ($($t:ty => $acc:ty),* $(,)?) => {$(
        impl Sample for $t {
            type Acc = $acc;

            #[inline]
            fn widen(self) -> $acc {
                <$acc>::from(self)
            }

            #[inline]
            fn repeated(self, times: u16) -> $acc {
                <$acc>::from(self) * <$acc>::from(times)
            }

            fn rounded_mean(sum: $acc, count: u16) -> Self {
                if count == 0 {
                    return 0;
                }
                let count = <$acc>::from(count);
                ((sum + count / 2) / count) as $t
            }

            fn float_mean(sum: $acc, count: u16) -> f32 {
                if count == 0 {
                    return 0.0;
                }
                (sum as f64 / f64::from(count)) as f32
            }
        }
    )*};
}

impl_signed_sample!(i8 => i32, i16 => i32, i32 => i64);
impl_unsigned_sample!(u8 => u32, u16 => u32, u32 => u64);

/// Running average over the last `capacity` samples.
///
/// Once `capacity` samples have been pushed, each new sample evicts the
/// oldest one. The buffer is allocated once in [`Averager::new`] and never
/// resized; [`Averager::reset`] only clears it.
///
/// ```rust,ignore
/// let mut avg = Averager::<i16>::new(NonZeroU16::new(4).unwrap());
/// avg.fill_from_slice(&[1, 2, 3, 4, 5]);
/// assert_eq!(avg.average(), 4); // (2 + 3 + 4 + 5) / 4 = 3.5
/// ```
#[derive(Debug, Clone)]
pub struct Averager<T: Sample> {
    /// Ring buffer of resident samples
    buffer: Vec<T>,
    /// Next slot to be written
    cursor: usize,
    /// Number of valid samples in `buffer`
    count: u16,
    /// Sum of the `count` resident samples
    sum: T::Acc,
    capacity: NonZeroU16,
}

impl<T: Sample> Averager<T> {
    /// Create an empty averager holding up to `capacity` samples.
    pub fn new(capacity: NonZeroU16) -> Self {
        Self {
            buffer: vec![T::default(); usize::from(capacity.get())],
            cursor: 0,
            count: 0,
            sum: T::Acc::default(),
            capacity,
        }
    }

    /// Push one sample, evicting the oldest if the buffer is full.
    pub fn new_data(&mut self, value: T) {
        if self.full() {
            self.sum = self.sum - self.buffer[self.cursor].widen();
        } else {
            self.count += 1;
        }

        self.buffer[self.cursor] = value;
        self.sum = self.sum + value.widen();
        self.cursor = (self.cursor + 1) % self.buffer.len();
    }

    /// Push every element of `data` in order.
    pub fn fill_from_slice(&mut self, data: &[T]) {
        for &value in data {
            self.new_data(value);
        }
    }

    /// Clear the averager.
    ///
    /// With a seed, the buffer is treated as holding `capacity` copies of it,
    /// so [`Averager::average`] returns the seed straight away and the
    /// averager reports itself as full.
    pub fn reset(&mut self, seed: Option<T>) {
        self.cursor = 0;
        match seed {
            Some(seed) => {
                self.buffer.fill(seed);
                self.count = self.capacity.get();
                self.sum = seed.repeated(self.capacity.get());
            }
            None => {
                self.buffer.fill(T::default());
                self.count = 0;
                self.sum = T::Acc::default();
            }
        }
    }

    /// Rounded average of the resident samples, or zero if there are none.
    pub fn average(&self) -> T {
        T::rounded_mean(self.sum, self.count)
    }

    /// Exact average of the resident samples, or `0.0` if there are none.
    pub fn float_average(&self) -> f32 {
        T::float_mean(self.sum, self.count)
    }

    /// Number of resident samples.
    pub fn n(&self) -> u16 {
        self.count
    }

    pub fn capacity(&self) -> u16 {
        self.capacity.get()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn full(&self) -> bool {
        self.count == self.capacity.get()
    }
}
