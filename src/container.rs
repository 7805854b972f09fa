//! A self-describing binary container of named, typed arrays.
//!
//! A container holds scalar metadata ([``Attribute``]) and
//! flat arrays ([``Dataset``]).  Every dataset carries a
//! CRC-32 of its stored bytes, and may be byte-shuffled and
//! deflated on the way out.  Readers verify the checksum and
//! undo the filters transparently.
//!
//! # Layout
//!
//! All integers are little-endian.
//!
//! ```text
//! magic        8 bytes
//! attr_count   u32
//!   name       u16 length + utf8
//!   rank       u8
//!   dims       u64 x rank
//!   values     u32 x product(dims)
//! dset_count   u32
//!   name       u16 length + utf8
//!   dtype      u8
//!   rank       u8
//!   dims       u64 x rank
//!   filters    u8
//!   stored_len u64
//!   crc32      u32
//!   payload    stored_len bytes
//! ```

use std::io::{Read, Write};

use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{Result, TreeSequenceError};

/// First bytes of every container.
pub const MAGIC: [u8; 8] = *b"\x89TSQ\r\n\x1a\n";

const MAX_RANK: usize = 8;

bitflags! {
    /// Transformations applied to a [``Dataset``] payload, in bit order.
    #[derive(Default)]
    pub struct Filters: u8 {
        /// Group the i-th byte of every element together.
        const SHUFFLE = 1 << 0;
        /// zlib/deflate at the best compression level.
        const DEFLATE = 1 << 1;
    }
}

/// Element type of a [``Dataset``].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DataType {
    /// Unsigned 32-bit integers
    U32,
    /// 64-bit floating point
    F64,
}

impl DataType {
    fn code(self) -> u8 {
        match self {
            DataType::U32 => 1,
            DataType::F64 => 2,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(DataType::U32),
            2 => Some(DataType::F64),
            _ => None,
        }
    }

    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            DataType::U32 => 4,
            DataType::F64 => 8,
        }
    }
}

mod private {
    pub trait Sealed {}
    impl Sealed for u32 {}
    impl Sealed for f64 {}
}

/// Types that can be stored in a [``Dataset``].
pub trait Element: Copy + Default + private::Sealed {
    /// The stored element type.
    const DATA_TYPE: DataType;
    /// Encode `values` into `dst`, which is exactly the right length.
    fn encode(values: &[Self], dst: &mut [u8]);
    /// Decode `src` into `dst`, which is exactly the right length.
    fn decode(src: &[u8], dst: &mut [Self]);
}

impl Element for u32 {
    const DATA_TYPE: DataType = DataType::U32;
    fn encode(values: &[Self], dst: &mut [u8]) {
        LittleEndian::write_u32_into(values, dst)
    }
    fn decode(src: &[u8], dst: &mut [Self]) {
        LittleEndian::read_u32_into(src, dst)
    }
}

impl Element for f64 {
    const DATA_TYPE: DataType = DataType::F64;
    fn encode(values: &[Self], dst: &mut [u8]) {
        LittleEndian::write_f64_into(values, dst)
    }
    fn decode(src: &[u8], dst: &mut [Self]) {
        LittleEndian::read_f64_into(src, dst)
    }
}

fn format_error<S: Into<String>>(msg: S) -> TreeSequenceError {
    TreeSequenceError::FileFormat(msg.into())
}

// A short read means the container was cut off,
// which is a property of the file, not of the device.
fn read_error(e: std::io::Error) -> TreeSequenceError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        format_error("truncated container")
    } else {
        TreeSequenceError::from(e)
    }
}

fn num_elements(dims: &[u64]) -> Result<usize> {
    let n = dims
        .iter()
        .try_fold(1_u64, |acc, d| acc.checked_mul(*d))
        .ok_or_else(|| format_error("dimensions overflow"))?;
    usize::try_from(n).map_err(|_| format_error("dimensions overflow"))
}

fn shuffle(bytes: &[u8], element_size: usize) -> Vec<u8> {
    let n = bytes.len() / element_size;
    let mut out = vec![0; bytes.len()];
    for (i, element) in bytes.chunks_exact(element_size).enumerate() {
        for (b, byte) in element.iter().enumerate() {
            out[b * n + i] = *byte;
        }
    }
    out
}

fn unshuffle(bytes: &[u8], element_size: usize) -> Vec<u8> {
    let n = bytes.len() / element_size;
    let mut out = vec![0; bytes.len()];
    for (i, element) in out.chunks_exact_mut(element_size).enumerate() {
        for (b, byte) in element.iter_mut().enumerate() {
            *byte = bytes[b * n + i];
        }
    }
    out
}

fn write_name<W: Write>(w: &mut W, name: &str) -> Result<()> {
    let len = u16::try_from(name.len())
        .map_err(|_| TreeSequenceError::Generic(format!("name too long: {}", name)))?;
    w.write_u16::<LittleEndian>(len)?;
    w.write_all(name.as_bytes())?;
    Ok(())
}

fn read_name<R: Read>(r: &mut R) -> Result<String> {
    let len = r.read_u16::<LittleEndian>().map_err(read_error)?;
    let mut buf = vec![0; len as usize];
    r.read_exact(&mut buf).map_err(read_error)?;
    String::from_utf8(buf).map_err(|_| format_error("name is not utf8"))
}

fn write_dims<W: Write>(w: &mut W, dims: &[u64]) -> Result<()> {
    let rank = u8::try_from(dims.len())
        .map_err(|_| TreeSequenceError::Generic("rank too large".to_string()))?;
    w.write_u8(rank)?;
    for d in dims {
        w.write_u64::<LittleEndian>(*d)?;
    }
    Ok(())
}

fn read_dims<R: Read>(r: &mut R) -> Result<Vec<u64>> {
    let rank = r.read_u8().map_err(read_error)? as usize;
    if rank > MAX_RANK {
        return Err(format_error(format!("unsupported rank {}", rank)));
    }
    let mut dims = Vec::with_capacity(rank);
    for _ in 0..rank {
        dims.push(r.read_u64::<LittleEndian>().map_err(read_error)?);
    }
    Ok(dims)
}

/// A named array of `u32` metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    name: String,
    dims: Vec<u64>,
    values: Vec<u32>,
}

impl Attribute {
    /// A rank 1 attribute holding one value.
    pub fn scalar<S: Into<String>>(name: S, value: u32) -> Self {
        Self {
            name: name.into(),
            dims: vec![1],
            values: vec![value],
        }
    }

    /// An attribute of arbitrary shape.
    ///
    /// # Errors
    ///
    /// [``TreeSequenceError::Generic``] if `values` does not
    /// hold `product(dims)` elements.
    pub fn new<S: Into<String>>(name: S, dims: Vec<u64>, values: Vec<u32>) -> Result<Self> {
        if num_elements(&dims).ok() != Some(values.len()) {
            return Err(TreeSequenceError::Generic(
                "attribute shape does not match its values".to_string(),
            ));
        }
        Ok(Self {
            name: name.into(),
            dims,
            values,
        })
    }

    /// The attribute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Extent of each dimension.
    pub fn dims(&self) -> &[u64] {
        &self.dims
    }

    /// The stored values, flattened.
    pub fn values(&self) -> &[u32] {
        &self.values
    }
}

/// A named, typed, possibly compressed array.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    name: String,
    data_type: DataType,
    dims: Vec<u64>,
    filters: Filters,
    checksum: u32,
    payload: Vec<u8>,
}

impl Dataset {
    /// Encode `values` with shape `dims`, applying `filters`.
    ///
    /// # Errors
    ///
    /// * [``TreeSequenceError::Generic``] if `values` does not hold
    ///   `product(dims)` elements.
    /// * [``TreeSequenceError::Io``] if compression fails.
    pub fn encode<T: Element, S: Into<String>>(
        name: S,
        dims: Vec<u64>,
        values: &[T],
        filters: Filters,
    ) -> Result<Self> {
        if num_elements(&dims).ok() != Some(values.len()) {
            return Err(TreeSequenceError::Generic(
                "dataset shape does not match its values".to_string(),
            ));
        }
        let size = T::DATA_TYPE.size();
        let mut bytes = vec![0; values.len() * size];
        T::encode(values, &mut bytes);
        if filters.contains(Filters::SHUFFLE) {
            bytes = shuffle(&bytes, size);
        }
        if filters.contains(Filters::DEFLATE) {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
            encoder.write_all(&bytes)?;
            bytes = encoder.finish()?;
        }
        Ok(Self {
            name: name.into(),
            data_type: T::DATA_TYPE,
            dims,
            filters,
            checksum: crc32fast::hash(&bytes),
            payload: bytes,
        })
    }

    /// Verify, unfilter, and decode the payload.
    ///
    /// # Errors
    ///
    /// [``TreeSequenceError::FileFormat``] if the element type
    /// differs from `T`, the checksum does not match, the payload
    /// cannot be inflated, or the decoded size disagrees with
    /// [``Dataset::dims``].
    pub fn decode<T: Element>(&self) -> Result<Vec<T>> {
        if self.data_type != T::DATA_TYPE {
            return Err(format_error(format!(
                "{}: expected {:?}, found {:?}",
                self.name,
                T::DATA_TYPE,
                self.data_type
            )));
        }
        if crc32fast::hash(&self.payload) != self.checksum {
            return Err(format_error(format!("{}: checksum mismatch", self.name)));
        }
        let size = self.data_type.size();
        let n = num_elements(&self.dims)?;
        let expected = n
            .checked_mul(size)
            .ok_or_else(|| format_error("dimensions overflow"))?;
        let mut bytes = if self.filters.contains(Filters::DEFLATE) {
            let mut out = Vec::new();
            ZlibDecoder::new(self.payload.as_slice())
                .take(expected as u64 + 1)
                .read_to_end(&mut out)
                .map_err(|_| format_error(format!("{}: corrupt deflate stream", self.name)))?;
            out
        } else {
            self.payload.clone()
        };
        if bytes.len() != expected {
            return Err(format_error(format!(
                "{}: expected {} bytes, found {}",
                self.name,
                expected,
                bytes.len()
            )));
        }
        if self.filters.contains(Filters::SHUFFLE) {
            bytes = unshuffle(&bytes, size);
        }
        let mut values = Vec::new();
        values.try_reserve_exact(n)?;
        values.resize(n, T::default());
        T::decode(&bytes, &mut values);
        Ok(values)
    }

    /// The dataset name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The element type.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Extent of each dimension.
    pub fn dims(&self) -> &[u64] {
        &self.dims
    }

    /// Filters applied to the payload.
    pub fn filters(&self) -> Filters {
        self.filters
    }

    /// CRC-32 of the stored payload.
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// Size of the stored payload in bytes.
    pub fn stored_len(&self) -> usize {
        self.payload.len()
    }
}

/// An in-memory container.
///
/// # Example
///
/// ```
/// use treeseqrs::container::{Attribute, Container, Dataset, Filters};
///
/// let mut c = Container::default();
/// c.push_attribute(Attribute::scalar("answer", 42)).unwrap();
/// c.push_dataset(Dataset::encode("x", vec![3], &[1_u32, 2, 3], Filters::all()).unwrap())
///     .unwrap();
/// let mut bytes = vec![];
/// c.write_to(&mut bytes).unwrap();
///
/// let c = Container::read_from(bytes.as_slice()).unwrap();
/// assert_eq!(c.attribute("answer").unwrap().values(), &[42]);
/// assert_eq!(c.dataset("x").unwrap().decode::<u32>().unwrap(), vec![1, 2, 3]);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Container {
    attributes: Vec<Attribute>,
    datasets: Vec<Dataset>,
}

impl Container {
    /// Add an attribute.
    ///
    /// # Errors
    ///
    /// [``TreeSequenceError::Generic``] if the name is taken.
    pub fn push_attribute(&mut self, attribute: Attribute) -> Result<()> {
        if self.attribute(attribute.name()).is_some() {
            return Err(TreeSequenceError::Generic(format!(
                "duplicate attribute {}",
                attribute.name()
            )));
        }
        self.attributes.push(attribute);
        Ok(())
    }

    /// Add a dataset.
    ///
    /// # Errors
    ///
    /// [``TreeSequenceError::Generic``] if the name is taken.
    pub fn push_dataset(&mut self, dataset: Dataset) -> Result<()> {
        if self.dataset(dataset.name()).is_some() {
            return Err(TreeSequenceError::Generic(format!(
                "duplicate dataset {}",
                dataset.name()
            )));
        }
        self.datasets.push(dataset);
        Ok(())
    }

    /// Look up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Look up a dataset by name.
    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|d| d.name == name)
    }

    /// All attributes, in insertion order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// All datasets, in insertion order.
    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    /// Serialize to `writer`.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&MAGIC)?;
        writer.write_u32::<LittleEndian>(self.attributes.len() as u32)?;
        for a in &self.attributes {
            write_name(&mut writer, &a.name)?;
            write_dims(&mut writer, &a.dims)?;
            for v in &a.values {
                writer.write_u32::<LittleEndian>(*v)?;
            }
        }
        writer.write_u32::<LittleEndian>(self.datasets.len() as u32)?;
        for d in &self.datasets {
            write_name(&mut writer, &d.name)?;
            writer.write_u8(d.data_type.code())?;
            write_dims(&mut writer, &d.dims)?;
            writer.write_u8(d.filters.bits())?;
            writer.write_u64::<LittleEndian>(d.payload.len() as u64)?;
            writer.write_u32::<LittleEndian>(d.checksum)?;
            writer.write_all(&d.payload)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Parse a container from `reader`.
    ///
    /// Only the structure is checked here.  Payloads are
    /// verified when decoded by [``Dataset::decode``].
    ///
    /// # Errors
    ///
    /// * [``TreeSequenceError::FileFormat``] for a bad magic number,
    ///   truncation, unknown element types or filters, or
    ///   duplicated names.
    /// * [``TreeSequenceError::Io``] if reading fails.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0_u8; 8];
        reader.read_exact(&mut magic).map_err(read_error)?;
        if magic != MAGIC {
            return Err(format_error("not a tree sequence container"));
        }
        let mut container = Container::default();
        let num_attributes = reader.read_u32::<LittleEndian>().map_err(read_error)?;
        for _ in 0..num_attributes {
            let name = read_name(&mut reader)?;
            let dims = read_dims(&mut reader)?;
            let n = num_elements(&dims)?;
            let mut values = Vec::new();
            for _ in 0..n {
                values.push(reader.read_u32::<LittleEndian>().map_err(read_error)?);
            }
            container
                .push_attribute(Attribute { name, dims, values })
                .map_err(|e| format_error(e.to_string()))?;
        }
        let num_datasets = reader.read_u32::<LittleEndian>().map_err(read_error)?;
        for _ in 0..num_datasets {
            let name = read_name(&mut reader)?;
            let code = reader.read_u8().map_err(read_error)?;
            let data_type = DataType::from_code(code)
                .ok_or_else(|| format_error(format!("{}: unknown element type {}", name, code)))?;
            let dims = read_dims(&mut reader)?;
            let bits = reader.read_u8().map_err(read_error)?;
            let filters = Filters::from_bits(bits)
                .ok_or_else(|| format_error(format!("{}: unknown filters {:#x}", name, bits)))?;
            let stored_len = reader.read_u64::<LittleEndian>().map_err(read_error)?;
            let checksum = reader.read_u32::<LittleEndian>().map_err(read_error)?;
            let mut payload = Vec::new();
            (&mut reader)
                .take(stored_len)
                .read_to_end(&mut payload)
                .map_err(read_error)?;
            if payload.len() as u64 != stored_len {
                return Err(format_error("truncated container"));
            }
            container
                .push_dataset(Dataset {
                    name,
                    data_type,
                    dims,
                    filters,
                    checksum,
                    payload,
                })
                .map_err(|e| format_error(e.to_string()))?;
        }
        Ok(container)
    }
}
