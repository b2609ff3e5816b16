mod common;

use common::{labelled_pdf, page_widths, png};
use lopdf::Document;
use print_rest_core::pdf::{encrypt_pdf, image_to_pdf, load_pdf, merge_pdfs, PageRange, PdfMerger};

#[test]
fn test_merge_whole_documents_in_order() {
    let a = labelled_pdf(1, 2);
    let b = labelled_pdf(2, 3);

    let merged = merge_pdfs(&[(&a, None), (&b, None)]).expect("merge should succeed");

    assert_eq!(page_widths(&merged), vec![100, 101, 200, 201, 202]);
}

#[test]
fn test_merge_interleaves_page_selections() {
    let a = labelled_pdf(1, 6);
    let b = labelled_pdf(2, 2);

    let merged = merge_pdfs(&[
        (&a, Some(PageRange::parse("0:2").unwrap())),
        (&b, None),
        (&a, Some(PageRange::parse("4").unwrap())),
    ])
    .unwrap();

    assert_eq!(page_widths(&merged), vec![100, 101, 200, 201, 104]);
}

#[test]
fn test_merge_honours_negative_and_stepped_ranges() {
    let a = labelled_pdf(3, 5);

    let last = merge_pdfs(&[(&a, Some(PageRange::parse("-1").unwrap()))]).unwrap();
    assert_eq!(page_widths(&last), vec![304]);

    let odd = merge_pdfs(&[(&a, Some(PageRange::parse("::2").unwrap()))]).unwrap();
    assert_eq!(page_widths(&odd), vec![300, 302, 304]);

    let reversed = merge_pdfs(&[(&a, Some(PageRange::parse("::-1").unwrap()))]).unwrap();
    assert_eq!(page_widths(&reversed), vec![304, 303, 302, 301, 300]);
}

#[test]
fn test_merged_pages_keep_inherited_resources() {
    let a = labelled_pdf(1, 1);
    let merged = merge_pdfs(&[(&a, None)]).unwrap();

    let doc = lopdf::Document::load_mem(&merged).unwrap();
    let page_id = *doc.get_pages().values().next().unwrap();
    let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
    assert!(page.has(b"Resources"), "page should carry its inherited resources");
}

#[test]
fn test_empty_selection_is_a_client_error() {
    let a = labelled_pdf(1, 2);
    let mut merger = PdfMerger::new();

    let err = merger
        .append_bytes(&a, Some(&PageRange::parse("5:9").unwrap()))
        .unwrap_err();

    assert_eq!(err.status(), 400);
    assert_eq!(merger.page_count(), 0);
}

#[test]
fn test_finish_without_pages_fails() {
    let err = PdfMerger::new().finish().unwrap_err();
    assert_eq!(err.status(), 400);
}

#[test]
fn test_unreadable_bytes_are_rejected() {
    assert!(load_pdf(b"not a pdf").is_err());
}

#[test]
fn test_encrypt_without_password_is_identity() {
    let a = labelled_pdf(1, 1);
    let out = encrypt_pdf(a.clone(), None).unwrap();
    assert_eq!(out, a);
}

#[test]
fn test_encrypt_adds_standard_security_handler() {
    let a = labelled_pdf(1, 2);
    let out = encrypt_pdf(a, Some("secret")).unwrap();

    assert!(out.starts_with(b"%PDF-"));
    assert!(
        out.windows(b"/Encrypt".len()).any(|w| w == b"/Encrypt"),
        "encrypted output must reference an /Encrypt dictionary"
    );
    // Protected documents cannot be fed back into a merge.
    assert!(load_pdf(&out).is_err());
}

#[test]
fn test_encrypted_output_opens_with_user_and_derived_owner_password() {
    let out = encrypt_pdf(labelled_pdf(1, 2), Some("p")).unwrap();

    let doc = Document::load_mem(&out).expect("encrypted output should still parse");
    assert!(doc.is_encrypted());
    assert!(doc.authenticate_user_password("p").is_ok());
    assert!(doc.authenticate_owner_password("powner").is_ok());
    assert!(doc.authenticate_password("nope").is_err());

    let mut wrong = Document::load_mem(&out).unwrap();
    assert!(wrong.decrypt("nope").is_err());

    let mut right = Document::load_mem(&out).unwrap();
    right.decrypt("p").expect("user password decrypts");
    assert_eq!(right.get_pages().len(), 2);
}

#[test]
fn test_image_becomes_single_page_pdf() {
    let pdf = image_to_pdf(&png(40, 20), "red.png").expect("png should convert");

    assert!(pdf.starts_with(b"%PDF-"));
    let doc = load_pdf(&pdf).unwrap();
    assert_eq!(doc.get_pages().len(), 1);
}

#[test]
fn test_undecodable_image_is_a_client_error() {
    let err = image_to_pdf(b"definitely not an image", "broken.png").unwrap_err();
    assert_eq!(err.status(), 400);
}
