use anyhow::{anyhow, bail, Context, Result};
use geo::{Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use serde_json::Value;

/// Read the feature list of a GeoJSON FeatureCollection, keeping each
/// feature as raw JSON.
pub(crate) fn read_features(bytes: &[u8]) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_slice(bytes).context("[io::geojson] Failed to parse GeoJSON bytes")?;
    match value.get("features") {
        Some(Value::Array(features)) => Ok(features.clone()),
        _ => bail!("[io::geojson] Expected a FeatureCollection with a features array"),
    }
}

/// Parse the geometry member of a GeoJSON feature. Missing or null
/// geometry is `None`.
pub(crate) fn feature_geometry(feature: &Value) -> Result<Option<Geometry<f64>>> {
    match feature.get("geometry") {
        None | Some(Value::Null) => Ok(None),
        Some(geometry) => parse_geometry(geometry).map(Some),
    }
}

/// Parse a GeoJSON geometry object.
fn parse_geometry(value: &Value) -> Result<Geometry<f64>> {
    let kind = value.get("type").and_then(Value::as_str)
        .ok_or_else(|| anyhow!("[io::geojson] Geometry is missing a type"))?;

    if kind == "GeometryCollection" {
        let members = value.get("geometries").and_then(Value::as_array)
            .ok_or_else(|| anyhow!("[io::geojson] GeometryCollection is missing geometries"))?;
        let geometries = members.iter().map(parse_geometry).collect::<Result<Vec<_>>>()?;
        return Ok(Geometry::GeometryCollection(GeometryCollection(geometries)));
    }

    let coords = value.get("coordinates")
        .ok_or_else(|| anyhow!("[io::geojson] {kind} is missing coordinates"))?;

    Ok(match kind {
        "Point" => Geometry::Point(Point(parse_coord(coords)?)),
        "MultiPoint" => Geometry::MultiPoint(MultiPoint(
            as_array(coords)?.iter().map(|c| parse_coord(c).map(Point)).collect::<Result<_>>()?
        )),
        "LineString" => Geometry::LineString(parse_line(coords)?),
        "MultiLineString" => Geometry::MultiLineString(MultiLineString(
            as_array(coords)?.iter().map(parse_line).collect::<Result<_>>()?
        )),
        "Polygon" => Geometry::Polygon(parse_polygon(coords)?),
        "MultiPolygon" => Geometry::MultiPolygon(MultiPolygon(
            as_array(coords)?.iter().map(parse_polygon).collect::<Result<_>>()?
        )),
        other => bail!("[io::geojson] Unsupported geometry type '{other}'"),
    })
}

fn as_array(value: &Value) -> Result<&Vec<Value>> {
    value.as_array().ok_or_else(|| anyhow!("[io::geojson] Expected a coordinate array"))
}

/// Parse a single [x, y, ...] position; extra dimensions are ignored.
fn parse_coord(value: &Value) -> Result<Coord<f64>> {
    let position = as_array(value)?;
    let (Some(x), Some(y)) = (position.first().and_then(Value::as_f64), position.get(1).and_then(Value::as_f64)) else {
        bail!("[io::geojson] Invalid position: {value}");
    };
    Ok(Coord { x, y })
}

fn parse_line(value: &Value) -> Result<LineString<f64>> {
    Ok(LineString(as_array(value)?.iter().map(parse_coord).collect::<Result<_>>()?))
}

/// Parse polygon rings: the first is the exterior, the rest are holes.
fn parse_polygon(value: &Value) -> Result<Polygon<f64>> {
    let mut rings = as_array(value)?.iter().map(parse_line);
    let exterior = match rings.next() {
        Some(ring) => ring?,
        None => LineString(vec![]),
    };
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}
