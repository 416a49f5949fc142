use crate::{
    block::{Block, Coefficients},
    error::{Error, Result},
    metadata::QTable,
};

/// Multiplies each coefficient of `plane` by the matching quantization table entry.
pub fn dequantize(block: &mut Block<Coefficients>, plane: usize, table: &QTable) -> Result<()> {
    for (coeff, &q) in block.plane_mut(plane).iter_mut().zip(&table.values) {
        let value = *coeff;
        *coeff = value.checked_mul(i32::from(q)).ok_or_else(|| {
            Error::decode(format!("dequantizing {value} by {q} overflows"))
        })?;
    }
    Ok(())
}
