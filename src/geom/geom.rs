use geo::{BoundingRect, Geometry, MultiPolygon, Polygon, Rect};

/// Collect the areal parts of a geometry into one MultiPolygon.
/// Points and lines contribute nothing.
pub(crate) fn areal_parts(geometry: &Geometry<f64>) -> MultiPolygon<f64> {
    fn collect(geometry: &Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
        match geometry {
            Geometry::Polygon(polygon) => out.push(polygon.clone()),
            Geometry::MultiPolygon(mp) => out.extend(mp.0.iter().cloned()),
            Geometry::Rect(rect) => out.push(rect.to_polygon()),
            Geometry::Triangle(triangle) => out.push(triangle.to_polygon()),
            Geometry::GeometryCollection(gc) => gc.0.iter().for_each(|g| collect(g, out)),
            _ => {}
        }
    }

    let mut polygons = Vec::new();
    collect(geometry, &mut polygons);
    MultiPolygon(polygons)
}

/// True for geometries with no coordinates at all.
pub(crate) fn is_empty(geometry: &Geometry<f64>) -> bool {
    match geometry {
        Geometry::Point(_) | Geometry::Line(_) | Geometry::Rect(_) | Geometry::Triangle(_) => false,
        Geometry::LineString(ls) => ls.0.is_empty(),
        Geometry::Polygon(polygon) => polygon.exterior().0.is_empty(),
        Geometry::MultiPoint(mp) => mp.0.is_empty(),
        Geometry::MultiLineString(mls) => mls.0.iter().all(|ls| ls.0.is_empty()),
        Geometry::MultiPolygon(mp) => mp.0.iter().all(|p| p.exterior().0.is_empty()),
        Geometry::GeometryCollection(gc) => gc.0.iter().all(is_empty),
    }
}

/// True for point and multipoint geometries, which are scored all-or-nothing.
#[inline]
pub(crate) fn is_puntal(geometry: &Geometry<f64>) -> bool {
    matches!(geometry, Geometry::Point(_) | Geometry::MultiPoint(_))
}

/// Envelope of a geometry, or None if it is empty.
#[inline]
pub(crate) fn envelope(geometry: &Geometry<f64>) -> Option<Rect<f64>> {
    if is_empty(geometry) { return None }
    geometry.bounding_rect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, polygon, GeometryCollection, MultiPoint};

    #[test]
    fn areal_parts_flattens_collections() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        let collection = Geometry::GeometryCollection(GeometryCollection(vec![
            Geometry::Point(point!(x: 5.0, y: 5.0)),
            Geometry::Polygon(square.clone()),
            Geometry::MultiPolygon(MultiPolygon(vec![square.clone(), square])),
        ]));
        assert_eq!(areal_parts(&collection).0.len(), 3);
        assert!(areal_parts(&Geometry::Point(point!(x: 1.0, y: 1.0))).0.is_empty());
    }

    #[test]
    fn emptiness() {
        assert!(is_empty(&Geometry::GeometryCollection(GeometryCollection(vec![]))));
        assert!(is_empty(&Geometry::MultiPoint(MultiPoint(vec![]))));
        assert!(!is_empty(&Geometry::Point(point!(x: 0.0, y: 0.0))));
        assert!(envelope(&Geometry::MultiPolygon(MultiPolygon(vec![]))).is_none());
    }
}
