//! MSB-first bit reader and canonical Huffman models of the crunch sections.

use crate::UnpackError;

/// Longest code length a model may use.
const MAX_CODE_SIZE: usize = 16;

/// Code length code symbols in transmission order.
const CODE_LENGTH_ORDER: [u8; 21] = [17, 18, 19, 20, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15, 16];

const SMALL_ZERO_RUN: u32 = 17;
const LARGE_ZERO_RUN: u32 = 18;
const SMALL_REPEAT: u32 = 19;
const LARGE_REPEAT: u32 = 20;

/// A canonical prefix code.
///
/// Codes are assigned in order of increasing length, ties broken by symbol
/// value. A model without any used symbol is valid but cannot decode.
#[derive(Debug, Clone, Default)]
pub(crate) struct HuffmanModel {
    total_symbols: usize,
    counts: [u16; MAX_CODE_SIZE + 1],
    symbols: Vec<u16>,
}

impl HuffmanModel {
    /// Builds the decoder for the given per-symbol code lengths (0 = unused).
    pub(crate) fn from_code_sizes(code_sizes: &[u8]) -> Result<Self, UnpackError> {
        let mut counts = [0u16; MAX_CODE_SIZE + 1];
        for &size in code_sizes {
            let size = size as usize;
            if size > MAX_CODE_SIZE {
                return Err(UnpackError::InvalidTable);
            }
            if size != 0 {
                counts[size] += 1;
            }
        }

        // Incomplete codes are fine (a single used symbol has length 1), over
        // subscribed ones are not.
        let kraft: u32 = (1..=MAX_CODE_SIZE)
            .map(|len| (counts[len] as u32) << (MAX_CODE_SIZE - len))
            .sum();
        if kraft > 1 << MAX_CODE_SIZE {
            return Err(UnpackError::InvalidTable);
        }

        let mut symbols = Vec::with_capacity(code_sizes.len());
        for len in 1..=MAX_CODE_SIZE {
            for (symbol, &size) in code_sizes.iter().enumerate() {
                if size as usize == len {
                    symbols.push(symbol as u16);
                }
            }
        }

        Ok(Self {
            total_symbols: code_sizes.len(),
            counts,
            symbols,
        })
    }

    /// Number of symbols the model was transmitted with, used or not.
    pub(crate) fn total_symbols(&self) -> usize {
        self.total_symbols
    }
}

/// Reads one section of a crunch file.
///
/// Bits are consumed most significant first. Lookahead past the end is
/// zero padded, consuming past the end is an error.
pub(crate) struct BitReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    fn bit_len(&self) -> usize {
        self.data.len() * 8
    }

    /// Returns the next 16 bits without consuming them.
    fn peek16(&self) -> u32 {
        let byte = self.position / 8;
        let shift = self.position % 8;

        let mut window = 0u32;
        for i in 0..3 {
            window = (window << 8) | self.data.get(byte + i).copied().unwrap_or(0) as u32;
        }
        (window >> (8 - shift)) & 0xFFFF
    }

    fn consume(&mut self, bits: usize) -> Result<(), UnpackError> {
        if self.position + bits > self.bit_len() {
            return Err(UnpackError::Truncated);
        }
        self.position += bits;
        Ok(())
    }

    /// Reads an unsigned value of up to 32 bits.
    pub(crate) fn read_bits(&mut self, bits: u32) -> Result<u32, UnpackError> {
        if bits > 16 {
            let high = self.read_bits(bits - 16)?;
            let low = self.read_bits(16)?;
            return Ok((high << 16) | low);
        }
        if bits == 0 {
            return Ok(0);
        }

        let value = self.peek16() >> (16 - bits);
        self.consume(bits as usize)?;
        Ok(value)
    }

    /// Decodes one symbol of `model`.
    pub(crate) fn decode(&mut self, model: &HuffmanModel) -> Result<u32, UnpackError> {
        let window = self.peek16();

        let mut first_code = 0u32;
        let mut first_index = 0usize;
        for len in 1..=MAX_CODE_SIZE {
            let count = model.counts[len] as u32;
            let code = window >> (MAX_CODE_SIZE - len);
            if code >= first_code && code - first_code < count {
                self.consume(len)?;
                let index = first_index + (code - first_code) as usize;
                return Ok(model.symbols[index] as u32);
            }
            first_index += count as usize;
            first_code = (first_code + count) << 1;
        }

        Err(UnpackError::InvalidSymbol)
    }

    /// Reads a model transmitted as code lengths, themselves coded with a
    /// small code length code using zero runs and repeats.
    pub(crate) fn read_model(&mut self) -> Result<HuffmanModel, UnpackError> {
        let total_symbols = self.read_bits(14)? as usize;
        if total_symbols == 0 {
            return Ok(HuffmanModel::default());
        }

        let sent = self.read_bits(5)? as usize;
        if sent == 0 || sent > CODE_LENGTH_ORDER.len() {
            return Err(UnpackError::InvalidTable);
        }

        let mut code_length_sizes = [0u8; 21];
        for &symbol in &CODE_LENGTH_ORDER[..sent] {
            code_length_sizes[symbol as usize] = self.read_bits(3)? as u8;
        }
        let code_lengths = HuffmanModel::from_code_sizes(&code_length_sizes)?;

        let mut sizes = vec![0u8; total_symbols];
        let mut offset = 0;
        while offset < total_symbols {
            let remaining = total_symbols - offset;
            match self.decode(&code_lengths)? {
                size @ 0..=16 => {
                    sizes[offset] = size as u8;
                    offset += 1;
                }
                code @ (SMALL_ZERO_RUN | LARGE_ZERO_RUN) => {
                    let run = if code == SMALL_ZERO_RUN {
                        self.read_bits(3)? as usize + 3
                    } else {
                        self.read_bits(7)? as usize + 11
                    };
                    if run > remaining {
                        return Err(UnpackError::InvalidTable);
                    }
                    offset += run;
                }
                code @ (SMALL_REPEAT | LARGE_REPEAT) => {
                    let run = if code == SMALL_REPEAT {
                        self.read_bits(2)? as usize + 3
                    } else {
                        self.read_bits(6)? as usize + 7
                    };
                    if offset == 0 || run > remaining {
                        return Err(UnpackError::InvalidTable);
                    }
                    let previous = sizes[offset - 1];
                    if previous == 0 {
                        return Err(UnpackError::InvalidTable);
                    }
                    sizes[offset..offset + run].fill(previous);
                    offset += run;
                }
                _ => return Err(UnpackError::InvalidTable),
            }
        }

        HuffmanModel::from_code_sizes(&sizes)
    }
}
