use proptest::prelude::*;
use std::sync::Arc;
use suds_codec::{Codec, Error, Object, Scalar, Value};
use suds_util::{
    soap::{Envelope, XSI_NAMESPACE},
    xml::{Document, Element},
};
use suds_wsdl::{builder, indexer::Indexer, schema::ANY_TYPE, types::MessageElement, types::TypeRef, Schema};

fn codec() -> Codec {
    let mut indexer = Indexer::default();
    indexer.index(&Document::parse(include_str!("fixtures/shapes.wsdl")).unwrap());

    let schema = Schema::from_snapshot(builder::build(&indexer).unwrap()).unwrap();
    Codec::new(Arc::new(schema))
}

fn ty(codec: &Codec, name: &str) -> TypeRef {
    codec
        .schema()
        .find("urn:shapes", name)
        .or_else(|| codec.schema().find("urn:extra", name))
        .unwrap()
}

fn object(codec: &Codec, name: &str) -> Object {
    match codec.class_for(ty(codec, name)).unwrap().instantiate() {
        Value::Object(object) => object,
        other => panic!("{} is not a structure: {:?}", name, other),
    }
}

/// Writes the element out and reads it back in.
fn reparse(element: &Element) -> Element {
    Document::parse(&element.to_xml_string().unwrap()).unwrap().into_root()
}

fn names(element: &Element) -> Vec<&str> {
    element.child_elements().map(|child| child.name.as_str()).collect()
}

#[test]
fn serializes_inherited_elements_first() {
    let codec = codec();
    let circle = object(&codec, "Circle").with("radius", 1.5).with("name", "c").with("id", 7);

    let element = codec
        .serialize(&circle.clone().into(), "shape", Some(ty(&codec, "Shape")))
        .unwrap();

    assert_eq!(names(&element), vec!["name", "radius"]);
    assert_eq!(element.attribute("id"), Some("7"));
    assert_eq!(element.attribute_ns(XSI_NAMESPACE, "type"), Some("Circle"));

    let read = codec.deserialize(ty(&codec, "Shape"), &reparse(&element)).unwrap();
    assert_eq!(read, Some(circle.into()));
}

#[test]
fn declares_a_prefix_for_foreign_xsi_types() {
    let codec = codec();
    let triangle = object(&codec, "Triangle").with("name", "t").with("corners", 3);

    let element = codec
        .serialize(&triangle.clone().into(), "shape", Some(ty(&codec, "Shape")))
        .unwrap();

    let index = ty(&codec, "Triangle").namespace();
    assert_eq!(
        element.attribute_ns(XSI_NAMESPACE, "type"),
        Some(format!("ns{}:Triangle", index).as_str())
    );

    let reparsed = reparse(&element);
    let prefix = format!("ns{}", index);
    assert_eq!(reparsed.lookup_namespace(Some(prefix.as_str())), Some("urn:extra"));

    // fields follow the actual type's namespace
    assert_eq!(reparsed.first_child_element().unwrap().namespace.as_deref(), Some("urn:extra"));

    let read = codec.deserialize(ty(&codec, "Shape"), &reparsed).unwrap();
    assert_eq!(read, Some(triangle.into()));
}

#[test]
fn materializing_twice_returns_the_same_class() {
    let codec = codec();
    let circle = ty(&codec, "Circle");

    let first = codec.class_for(circle).unwrap();
    let second = codec.class_for(circle).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let shape = codec.class_for(ty(&codec, "Shape")).unwrap();
    assert!(Arc::ptr_eq(first.base().unwrap(), &shape));
    assert_eq!(first.fields(), vec!["name", "id", "radius"]);
    assert!(first.is_subclass_of(&shape));
    assert!(!shape.is_subclass_of(&first));
}

#[test]
fn missing_required_elements_fail() {
    let codec = codec();
    let circle = object(&codec, "Circle").with("name", "c");

    let result = codec.serialize(&circle.into(), "shape", None);

    assert_eq!(
        result,
        Err(Error::MissingProperty {
            ty: "{urn:shapes}Circle".into(),
            property: "radius".into(),
        })
    );
}

#[test]
fn missing_required_attributes_fail() {
    let codec = codec();
    let drawing = object(&codec, "Drawing")
        .with("title", "t")
        .with("width", object(&codec, "Measure").with_value(2.5));

    assert!(matches!(
        codec.serialize(&drawing.into(), "drawing", None),
        Err(Error::MissingAttribute { attribute, .. }) if attribute == "unit"
    ));
}

#[test]
fn unknown_fields_fail() {
    let codec = codec();
    let shape = object(&codec, "Shape").with("name", "s").with("colour", "red");

    assert!(matches!(
        codec.serialize(&shape.into(), "shape", None),
        Err(Error::UnnecessaryProperty { property, .. }) if property == "colour"
    ));
}

#[test]
fn unrelated_types_fail() {
    let codec = codec();
    let square = object(&codec, "Square").with("name", "s").with("side", 2);

    assert!(matches!(
        codec.serialize(&square.into(), "shape", Some(ty(&codec, "Circle"))),
        Err(Error::UnexpectedType { .. })
    ));

    assert!(matches!(
        codec.serialize(&Value::from("loose"), "shape", None),
        Err(Error::UnrecognizedType(_))
    ));
}

#[test]
fn objects_do_not_fit_scalar_slots() {
    let codec = codec();
    let drawing = object(&codec, "Drawing").with("title", object(&codec, "Shape").with("name", "inner"));

    assert!(matches!(
        codec.serialize(&drawing.into(), "drawing", None),
        Err(Error::UnexpectedType { expected, .. }) if expected.ends_with("}string")
    ));

    // anyType still takes anything
    let circle = object(&codec, "Circle").with("name", "c").with("radius", 1.0);
    let element = codec.serialize(&circle.into(), "value", Some(ANY_TYPE)).unwrap();
    assert_eq!(element.attribute_ns(XSI_NAMESPACE, "type").map(|ty| ty.ends_with("Circle")), Some(true));
}

#[test]
fn infinite_floats_round_trip() {
    let codec = codec();

    for radius in [f64::INFINITY, f64::NEG_INFINITY] {
        let circle = object(&codec, "Circle").with("name", "c").with("radius", radius);
        let element = codec.serialize(&circle.clone().into(), "shape", None).unwrap();

        let text = element.child_elements().find(|child| child.name == "radius").unwrap().text_content();
        assert_eq!(text, if radius > 0.0 { "INF" } else { "-INF" });

        let read = codec.deserialize(ty(&codec, "Circle"), &reparse(&element)).unwrap();
        assert_eq!(read, Some(circle.into()));
    }
}

#[test]
fn enumerations_are_validated_both_ways() {
    let codec = codec();
    let drawing = |colour: &str| object(&codec, "Drawing").with("title", "t").with("colour", colour);

    let element = codec.serialize(&drawing("green").into(), "drawing", None).unwrap();
    let colour = element.child_elements().find(|child| child.name == "colour").unwrap();
    assert_eq!(colour.text_content(), "green");

    let read = codec.deserialize(ty(&codec, "Drawing"), &reparse(&element)).unwrap().unwrap();
    let colour = read.as_object().unwrap().get("colour").unwrap().as_object().unwrap();
    assert_eq!(colour.value, Some(Scalar::from("green")));

    assert!(matches!(
        codec.serialize(&drawing("purple").into(), "drawing", None),
        Err(Error::InvalidEnumValue { value, .. }) if value == "purple"
    ));

    let invalid = Document::parse(
        r#"<drawing xmlns="urn:shapes"><title>t</title><colour>purple</colour></drawing>"#,
    )
    .unwrap();
    assert!(matches!(
        codec.deserialize(ty(&codec, "Drawing"), invalid.root()),
        Err(Error::InvalidEnumValue { .. })
    ));

    // a union with an XSD member accepts anything
    let tinted = object(&codec, "Drawing").with("title", "t").with("tint", "mauve");
    assert!(codec.serialize(&tinted.into(), "drawing", None).is_ok());
}

#[test]
fn array_types_read_as_sequences() {
    let codec = codec();
    let array_type = ty(&codec, "ArrayOfShape");
    let shape = |name: &str| Value::from(object(&codec, "Shape").with("name", name));

    let array = codec
        .class_for(array_type)
        .unwrap()
        .construct([("", shape("a")), ("", shape("b"))]);

    let element = codec.serialize(&array, "shapes", None).unwrap();
    assert_eq!(names(&element), vec!["Shape", "Shape"]);

    let read = codec.deserialize(array_type, &reparse(&element)).unwrap().unwrap();
    let items = &read.as_array().unwrap().items;
    assert_eq!(items.len(), 2);
    assert_eq!(items[1], shape("b"));
    assert_eq!(read, array);
}

#[test]
fn repeated_elements_read_as_lists() {
    let codec = codec();
    let circle = Value::from(object(&codec, "Circle").with("name", "c").with("radius", 2.0));
    let square = Value::from(object(&codec, "Square").with("name", "s").with("side", 3));

    let drawing = object(&codec, "Drawing")
        .with("title", "t")
        .with("shapes", vec![circle, square])
        .with("thumbnail", b"png".to_vec())
        .with("width", object(&codec, "Measure").with_value(2.5).with("unit", "cm"));

    let element = codec.serialize(&drawing.clone().into(), "drawing", None).unwrap();
    assert_eq!(names(&element), vec!["title", "shapes", "shapes", "width", "thumbnail"]);

    let read = codec.deserialize(ty(&codec, "Drawing"), &reparse(&element)).unwrap();
    assert_eq!(read, Some(drawing.into()));
}

#[test]
fn wildcards_absorb_leftover_fields() {
    let codec = codec();
    let bag = object(&codec, "Bag").with("label", "l").with("colour", "red").with("size", 2);

    let element = codec.serialize(&bag.into(), "bag", None).unwrap();
    assert_eq!(names(&element), vec!["label", "colour", "size"]);

    let overfull = object(&codec, "Bag")
        .with("label", "l")
        .with("a", 1)
        .with("b", 2)
        .with("c", 3);

    assert!(matches!(
        codec.serialize(&overfull.into(), "bag", None),
        Err(Error::UnnecessaryProperty { .. })
    ));
}

#[test]
fn empty_elements_read_as_absent() {
    let codec = codec();
    let document = Document::parse(r#"<shape xmlns="urn:shapes"/>"#).unwrap();

    assert_eq!(codec.deserialize(ty(&codec, "Shape"), document.root()).unwrap(), None);
}

#[test]
fn unknown_xsi_types_degrade_to_empty_objects() {
    let codec = codec();
    let document = Document::parse(
        r#"<shape xmlns="urn:shapes" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:type="Hexagon">
  <name>h</name>
</shape>"#,
    )
    .unwrap();

    let read = codec.deserialize(ty(&codec, "Shape"), document.root()).unwrap().unwrap();
    let object = read.as_object().unwrap();

    assert_eq!(object.ty(), ANY_TYPE);
    assert!(object.fields.is_empty());
}

fn fault_envelope(body: &str) -> Envelope {
    let xml = format!(
        r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"
                  xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <soapenv:Body>
    <soapenv:Fault>{}</soapenv:Fault>
  </soapenv:Body>
</soapenv:Envelope>"#,
        body
    );

    Envelope::from_response(xml.as_bytes()).unwrap()
}

#[test]
fn declared_faults_provide_cause_and_messages() {
    let codec = codec();
    let declared = [MessageElement {
        name: "DrawingFaultElement".into(),
        ty: ty(&codec, "DrawingFault"),
    }];

    let envelope = fault_envelope(
        r#"<faultcode>ServerFaultCode</faultcode>
      <faultstring>ignored</faultstring>
      <detail>
        <DrawingFaultElement xmlns="urn:shapes">
          <faultCause><localizedMessage>canvas is full</localizedMessage></faultCause>
          <faultMessage><message>first</message></faultMessage>
          <faultMessage><message>second</message></faultMessage>
        </DrawingFaultElement>
      </detail>"#,
    );

    let fault = codec.deserialize_fault(&declared, &envelope);

    assert_eq!(fault.name.as_deref(), Some("DrawingFaultElement"));
    assert_eq!(fault.cause, "canvas is full");
    assert_eq!(fault.messages, vec!["first", "second"]);
    assert_eq!(fault.code.as_deref(), Some("ServerFaultCode"));
}

#[test]
fn undeclared_faults_fall_back_to_the_detail_child() {
    let codec = codec();

    let envelope = fault_envelope(
        r#"<faultcode>ServerFaultCode</faultcode>
      <faultstring>Circle is too round</faultstring>
      <detail>
        <ShapeFault xmlns="urn:shapes" xsi:type="Circle">
          <name>c</name>
          <radius>4</radius>
        </ShapeFault>
      </detail>"#,
    );

    let fault = codec.deserialize_fault(&[], &envelope);

    let detail = fault.detail.as_ref().unwrap().as_object().unwrap();
    assert_eq!(detail.ty(), ty(&codec, "Circle"));
    assert_eq!(detail.get("radius"), Some(&Value::from(4.0)));

    assert_eq!(fault.cause, "ServerFaultCode");
    assert_eq!(fault.messages, vec!["Circle is too round"]);
}

#[test]
fn bare_faults_still_have_a_cause_and_message() {
    let codec = codec();
    let fault = codec.deserialize_fault(&[], &fault_envelope(""));

    assert!(fault.detail.is_none());
    assert_eq!(fault.cause, "no fault message");
    assert_eq!(fault.messages, vec!["no fault message"]);
}

proptest! {
    #[test]
    fn strings_and_integers_round_trip(left in "[a-zA-Z0-9 <>&'\"]{1,24}", right in any::<i64>()) {
        let codec = codec();
        let pair_type = ty(&codec, "Pair");
        let pair = Value::from(object(&codec, "Pair").with("left", left).with("right", right));

        let element = codec.serialize(&pair, "pair", Some(pair_type)).unwrap();
        let request = Envelope::new(element).to_request().unwrap();

        let envelope = Envelope::from_response(request.as_bytes()).unwrap();
        let node = envelope.body().unwrap().first_child_element().unwrap();

        prop_assert_eq!(codec.deserialize(pair_type, node).unwrap(), Some(pair));
    }
}
